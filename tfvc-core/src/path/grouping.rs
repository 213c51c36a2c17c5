use std::collections::BTreeMap;

use super::TfsPath;

/// `None` groups local paths, whose workspace the tool resolves itself.
pub type WorkspaceGroupKey = Option<String>;

/// Partitions paths by the workspace each one is addressed through. The tool
/// activates one workspace per invocation, so every batched call must be
/// issued once per group.
pub fn group_by_workspace<I>(paths: I) -> BTreeMap<WorkspaceGroupKey, Vec<TfsPath>>
where
    I: IntoIterator<Item = TfsPath>,
{
    let mut groups: BTreeMap<WorkspaceGroupKey, Vec<TfsPath>> = BTreeMap::new();
    for path in paths {
        let key = match &path {
            TfsPath::Local(_) => None,
            TfsPath::Server(server) => Some(server.workspace().to_string()),
        };
        groups.entry(key).or_default().push(path);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::collections::HashSet;

    fn random_paths(rng: &mut impl Rng, count: usize) -> Vec<TfsPath> {
        (0..count)
            .map(|i| {
                if rng.gen_bool(0.4) {
                    TfsPath::local(format!("/src/file{i}.txt"))
                } else {
                    let workspace = format!("W{}", rng.gen_range(1..4));
                    TfsPath::server(&format!("$/proj/file{i}.txt"), workspace).unwrap()
                }
            })
            .collect()
    }

    #[test]
    fn test_groups_local_and_server_paths() {
        let paths = vec![
            TfsPath::local("/a"),
            TfsPath::server("$/p/b", "W1").unwrap(),
            TfsPath::local("/c"),
            TfsPath::server("$/p/d", "W2").unwrap(),
            TfsPath::server("$/p/e", "W1").unwrap(),
        ];

        let groups = group_by_workspace(paths);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[&None].len(), 2);
        assert_eq!(groups[&Some("W1".to_string())].len(), 2);
        assert_eq!(groups[&Some("W2".to_string())].len(), 1);
    }

    #[test]
    fn test_grouping_is_an_exact_partition() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let count = rng.gen_range(0..40);
            let paths = random_paths(&mut rng, count);
            let groups = group_by_workspace(paths.clone());

            let total: usize = groups.values().map(Vec::len).sum();
            assert_eq!(total, paths.len());

            let union: HashSet<&TfsPath> = groups.values().flatten().collect();
            let input: HashSet<&TfsPath> = paths.iter().collect();
            assert_eq!(union, input);

            for (key, members) in &groups {
                assert!(!members.is_empty());
                assert!(members.iter().all(|p| p.workspace() == key.as_deref()));
            }
        }
    }

    #[test]
    fn test_empty_input_has_no_groups() {
        assert!(group_by_workspace(Vec::new()).is_empty());
    }
}
