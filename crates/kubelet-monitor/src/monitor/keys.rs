//! Entity key derivation
//!
//! Keys are pure functions of cluster identity, so generating metrics for
//! the same entity twice in a cycle always lands on the same sink entry.

use super::stats::{Node, NodeStats, PodReference};

/// Key of a node, from the node object
pub fn node_key(node: &Node) -> String {
    node.name.clone()
}

/// Key of a node, from its reported statistics
pub fn node_stats_key(stats: &NodeStats) -> String {
    stats.node_name.clone()
}

/// Key of a node's image filesystem
pub fn imagefs_key(node_key: &str) -> String {
    format!("{}-imagefs", node_key)
}

/// `namespace/name`
pub fn pod_key(pod: &PodReference) -> String {
    format!("{}/{}", pod.namespace, pod.name)
}

/// `namespace/pod/container`
pub fn container_key(pod_key: &str, container_name: &str) -> String {
    format!("{}/{}", pod_key, container_name)
}

pub fn application_key(container_key: &str) -> String {
    format!("App-{}", container_key)
}

pub fn pod_volume_key(pod_key: &str, volume_name: &str) -> String {
    format!("{}-{}", pod_key, volume_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_key_matches_throttling_identity() {
        let pod = PodReference {
            name: "web-0".to_string(),
            namespace: "shop".to_string(),
            uid: "1234".to_string(),
        };
        let key = container_key(&pod_key(&pod), "nginx");
        assert_eq!(key, "shop/web-0/nginx");
        assert_eq!(application_key(&key), "App-shop/web-0/nginx");
    }

    #[test]
    fn test_keys_are_deterministic() {
        let pod = PodReference {
            name: "web-0".to_string(),
            namespace: "shop".to_string(),
            uid: String::new(),
        };
        assert_eq!(pod_key(&pod), pod_key(&pod.clone()));
        assert_eq!(pod_volume_key("shop/web-0", "data"), "shop/web-0-data");
        assert_eq!(imagefs_key("worker-1"), "worker-1-imagefs");
    }
}
