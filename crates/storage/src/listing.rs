//! Delimiter semantics on top of a sorted, recursive listing

use crate::{ObjectEntry, ObjectListing, KEY_SEPARATOR};
use futures::StreamExt;

/// Reduce a sorted recursive listing under `prefix` to its direct children.
///
/// Keys with a separator after the prefix collapse into one marker entry for
/// the child directory. Keys sharing a child directory are contiguous in a
/// sorted listing, so only the last emitted directory needs remembering.
pub fn direct_children(listing: ObjectListing, prefix: &str) -> ObjectListing {
    let prefix = prefix.to_string();
    let mut last_directory: Option<String> = None;

    listing
        .filter_map(move |item| {
            let child = match item {
                Err(e) => Some(Err(e)),
                Ok(entry) => match child_directory(&prefix, &entry.key) {
                    None => Some(Ok(entry)),
                    Some(directory) => {
                        if last_directory.as_deref() == Some(directory.as_str()) {
                            None
                        } else {
                            last_directory = Some(directory.clone());
                            Some(Ok(ObjectEntry::new(directory, 0)))
                        }
                    }
                },
            };
            futures::future::ready(child)
        })
        .boxed()
}

/// Key of the child directory containing `key`, or `None` for a direct child object
fn child_directory(prefix: &str, key: &str) -> Option<String> {
    let remainder = key.strip_prefix(prefix)?;
    let separator = remainder.find(KEY_SEPARATOR)?;
    Some(key[..prefix.len() + separator + 1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn listing(keys: &[(&str, u64)]) -> ObjectListing {
        let entries: Vec<_> = keys
            .iter()
            .map(|(key, size)| Ok(ObjectEntry::new(*key, *size)))
            .collect();
        futures::stream::iter(entries).boxed()
    }

    #[tokio::test]
    async fn test_direct_children_collapses_directories() {
        let source = listing(&[
            ("u/docs/", 0),
            ("u/docs/a.txt", 1),
            ("u/docs/deep/", 0),
            ("u/docs/deep/b.txt", 2),
            ("u/docs/deep/c.txt", 3),
            ("u/docs/implied/d.txt", 4),
            ("u/docs/z.txt", 5),
        ]);

        let children: Vec<ObjectEntry> = direct_children(source, "u/docs/")
            .try_collect()
            .await
            .unwrap();
        let keys: Vec<&str> = children.iter().map(|e| e.key.as_str()).collect();

        assert_eq!(
            keys,
            vec![
                "u/docs/",
                "u/docs/a.txt",
                "u/docs/deep/",
                "u/docs/implied/",
                "u/docs/z.txt"
            ]
        );
        assert!(children[2].is_marker);
        assert!(children[3].is_marker);
        assert_eq!(children[4].size, 5);
    }

    #[test]
    fn test_child_directory() {
        assert_eq!(child_directory("u/", "u/a.txt"), None);
        assert_eq!(child_directory("u/", "u/a/b.txt"), Some("u/a/".to_string()));
        assert_eq!(child_directory("u/", "u/a/"), Some("u/a/".to_string()));
        assert_eq!(child_directory("u/", "u/"), None);
    }
}
