//! Coordination store launch parameters

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Member name used for a single-node bootstrap
pub const DEFAULT_MEMBER_NAME: &str = "default";

/// Listen and advertise URLs, computed once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchUrls {
    pub listen_client: String,
    pub advertise_client: String,
    pub listen_peer: String,
    pub initial_advertise_peer: String,
}

impl LaunchUrls {
    /// Client and peer URLs on a single host address
    pub fn for_host(ip: IpAddr, client_port: u16, peer_port: u16) -> Self {
        let client = format!("http://{}", SocketAddr::new(ip, client_port));
        let peer = format!("http://{}", SocketAddr::new(ip, peer_port));
        Self {
            listen_client: client.clone(),
            advertise_client: client,
            listen_peer: peer.clone(),
            initial_advertise_peer: peer,
        }
    }
}

/// Arguments of one coordination store launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreArgs {
    pub urls: LaunchUrls,
    /// `--initial-cluster` value, set only on the very first bootstrap
    pub initial_cluster: Option<String>,
    pub data_dir: Option<PathBuf>,
}

impl StoreArgs {
    /// First node of a new cluster: a single-member cluster of itself
    pub fn bootstrap(urls: LaunchUrls, data_dir: Option<PathBuf>) -> Self {
        let initial_cluster = format!("{}={}", DEFAULT_MEMBER_NAME, urls.listen_peer);
        Self {
            urls,
            initial_cluster: Some(initial_cluster),
            data_dir,
        }
    }

    /// Member whose cluster membership is already settled
    pub fn rejoin(urls: LaunchUrls, data_dir: Option<PathBuf>) -> Self {
        Self {
            urls,
            initial_cluster: None,
            data_dir,
        }
    }

    /// Same launch without the bootstrap declaration
    pub fn without_bootstrap(&self) -> Self {
        Self {
            initial_cluster: None,
            ..self.clone()
        }
    }

    pub fn is_bootstrap(&self) -> bool {
        self.initial_cluster.is_some()
    }

    /// URL the health endpoint is reached on
    pub fn client_url(&self) -> &str {
        &self.urls.advertise_client
    }

    /// Command line handed to the store executable
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--listen-client-urls".to_string(),
            self.urls.listen_client.clone(),
            "--advertise-client-urls".to_string(),
            self.urls.advertise_client.clone(),
            "--listen-peer-urls".to_string(),
            self.urls.listen_peer.clone(),
            "--initial-advertise-peer-urls".to_string(),
            self.urls.initial_advertise_peer.clone(),
        ];
        if let Some(dir) = &self.data_dir {
            args.push("--data-dir".to_string());
            args.push(dir.display().to_string());
        }
        if let Some(cluster) = &self.initial_cluster {
            args.push("--initial-cluster".to_string());
            args.push(cluster.clone());
        }
        args
    }
}
