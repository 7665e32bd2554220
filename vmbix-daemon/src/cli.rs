//! Command line flags. Flags override the configuration file.

use clap::Parser;
use std::path::PathBuf;
use vmbix_core::Config;

#[derive(Parser, Debug)]
#[command(name = "vmbixd")]
#[command(version, about = "Zabbix bridge for a virtualization management endpoint", long_about = None)]
pub struct Cli {
    /// Endpoint username
    #[arg(short = 'u', long)]
    pub username: Option<String>,

    /// Endpoint password
    #[arg(short = 'p', long)]
    pub password: Option<String>,

    /// Endpoint URL (e.g. file:///var/lib/vmbix/inventory.json)
    #[arg(short = 's', long = "serviceurl")]
    pub service_url: Option<String>,

    /// Address to listen on
    #[arg(short = 'b', long)]
    pub bind: Option<String>,

    /// Port to listen on
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// Pid file path
    #[arg(short = 'f', long)]
    pub pid: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(username) = &self.username {
            config.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            config.password = Some(password.clone());
        }
        if let Some(url) = &self.service_url {
            config.service_url = Some(url.clone());
        }
        if let Some(bind) = &self.bind {
            config.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            config.listen_port = Some(port);
        }
        if let Some(pid) = &self.pid {
            config.pid_file = Some(pid.clone());
        }
        config
    }
}
