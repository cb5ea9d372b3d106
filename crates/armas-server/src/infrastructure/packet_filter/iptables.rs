//! `iptables`-backed packet filter.
//!
//! Each primitive is one invocation of the `iptables` binary:
//!
//! | Primitive          | Command                                                     |
//! |--------------------|-------------------------------------------------------------|
//! | `insert_deny_rule` | `iptables -I <chain> -m mac --mac-source <MAC> -j DROP`     |
//! | `remove_deny_rule` | `iptables -D <chain> -m mac --mac-source <MAC> -j DROP`     |
//! | `list_deny_rules`  | `iptables -L <chain> -n`                                    |
//!
//! With `use_sudo` set the whole command line is prefixed with `sudo`, which
//! expects a passwordless sudoers entry for the service user.
//!
//! Every invocation runs with `kill_on_drop` and is raced against the
//! configured timeout, so a hung `iptables` (e.g. waiting on the xtables
//! lock) surfaces as [`FilterError::Timeout`] instead of stalling a request.

use std::process::Stdio;
use std::time::Duration;

use armas_core::MacAddress;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::application::policy_store::{FilterError, PacketFilter};
use crate::infrastructure::storage::config::FilterConfig;

/// A [`PacketFilter`] that drives the host's `iptables`.
#[derive(Debug, Clone)]
pub struct IptablesFilter {
    binary: String,
    use_sudo: bool,
    chain: String,
    timeout: Duration,
}

impl IptablesFilter {
    pub fn new(
        binary: impl Into<String>,
        use_sudo: bool,
        chain: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            binary: binary.into(),
            use_sudo,
            chain: chain.into(),
            timeout,
        }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(
            config.binary.clone(),
            config.use_sudo,
            config.chain.clone(),
            Duration::from_secs(config.command_timeout_secs),
        )
    }

    /// Program and argument vector for one `iptables` invocation.
    fn command_line(&self, args: Vec<String>) -> (String, Vec<String>) {
        if self.use_sudo {
            let mut argv = Vec::with_capacity(args.len() + 1);
            argv.push(self.binary.clone());
            argv.extend(args);
            ("sudo".to_string(), argv)
        } else {
            (self.binary.clone(), args)
        }
    }

    /// Runs `iptables` with `args` and returns its stdout.
    async fn run(&self, args: Vec<String>) -> Result<String, FilterError> {
        let (program, argv) = self.command_line(args);
        let command = format!("{program} {}", argv.join(" "));
        debug!("running `{command}`");

        let mut cmd = Command::new(&program);
        cmd.args(&argv).stdin(Stdio::null()).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => {
                warn!("`{command}` timed out after {:?}", self.timeout);
                return Err(FilterError::Timeout {
                    command,
                    timeout: self.timeout,
                });
            }
            Ok(Err(source)) => return Err(FilterError::Spawn { program, source }),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("`{command}` failed: {stderr}");
            return Err(FilterError::CommandFailed {
                command,
                status: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl PacketFilter for IptablesFilter {
    async fn insert_deny_rule(&self, mac: MacAddress) -> Result<(), FilterError> {
        self.run(deny_rule_args("-I", &self.chain, mac)).await.map(drop)
    }

    async fn remove_deny_rule(&self, mac: MacAddress) -> Result<(), FilterError> {
        self.run(deny_rule_args("-D", &self.chain, mac)).await.map(drop)
    }

    async fn list_deny_rules(&self) -> Result<Vec<MacAddress>, FilterError> {
        let listing = self
            .run(vec!["-L".to_string(), self.chain.clone(), "-n".to_string()])
            .await?;
        Ok(parse_deny_rules(&listing))
    }
}

/// Arguments for inserting (`-I`) or deleting (`-D`) the deny rule for `mac`.
pub fn deny_rule_args(op: &str, chain: &str, mac: MacAddress) -> Vec<String> {
    let mac = mac.to_string();
    [op, chain, "-m", "mac", "--mac-source", mac.as_str(), "-j", "DROP"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Extracts one address per deny rule from `iptables -L <chain> -n` output.
///
/// A rule line looks like:
///
/// ```text
/// DROP       all  --  0.0.0.0/0            0.0.0.0/0            MAC AA:BB:CC:DD:EE:FF
/// ```
///
/// Duplicates are preserved so callers can tell how many rules exist.
pub fn parse_deny_rules(listing: &str) -> Vec<MacAddress> {
    listing
        .lines()
        .filter(|line| line.contains("DROP") && line.contains("MAC"))
        .filter_map(MacAddress::find_in)
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
Chain FORWARD (policy ACCEPT)
target     prot opt source               destination
DROP       all  --  0.0.0.0/0            0.0.0.0/0            MAC AA:BB:CC:DD:EE:01
ACCEPT     all  --  0.0.0.0/0            0.0.0.0/0            state RELATED,ESTABLISHED
DROP       all  --  0.0.0.0/0            0.0.0.0/0            MAC aa:bb:cc:dd:ee:02
DROP       all  --  0.0.0.0/0            0.0.0.0/0            MAC AA:BB:CC:DD:EE:01
DROP       all  --  10.0.0.0/8           0.0.0.0/0
";

    fn mac(raw: &str) -> MacAddress {
        MacAddress::parse(raw).unwrap()
    }

    #[test]
    fn test_parse_deny_rules_keeps_duplicates_and_skips_other_rules() {
        let rules = parse_deny_rules(LISTING);

        assert_eq!(
            rules,
            vec![
                mac("AA:BB:CC:DD:EE:01"),
                mac("AA:BB:CC:DD:EE:02"),
                mac("AA:BB:CC:DD:EE:01"),
            ]
        );
    }

    #[test]
    fn test_parse_deny_rules_of_empty_chain() {
        let listing = "Chain FORWARD (policy ACCEPT)\ntarget     prot opt source               destination\n";
        assert!(parse_deny_rules(listing).is_empty());
    }

    #[test]
    fn test_deny_rule_args_match_mac_source() {
        let args = deny_rule_args("-I", "FORWARD", mac("aa-bb-cc-dd-ee-ff"));
        assert_eq!(
            args,
            [
                "-I",
                "FORWARD",
                "-m",
                "mac",
                "--mac-source",
                "AA:BB:CC:DD:EE:FF",
                "-j",
                "DROP"
            ]
        );
    }

    #[test]
    fn test_command_line_prefixes_sudo() {
        let filter = IptablesFilter::new("iptables", true, "FORWARD", Duration::from_secs(5));

        let (program, argv) = filter.command_line(vec!["-L".into()]);

        assert_eq!(program, "sudo");
        assert_eq!(argv, ["iptables", "-L"]);
    }

    #[test]
    fn test_command_line_without_sudo() {
        let filter =
            IptablesFilter::new("/usr/sbin/iptables", false, "FORWARD", Duration::from_secs(5));

        let (program, argv) = filter.command_line(vec!["-L".into()]);

        assert_eq!(program, "/usr/sbin/iptables");
        assert_eq!(argv, ["-L"]);
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let filter = IptablesFilter::new(
            "/nonexistent/armas-test-iptables",
            false,
            "FORWARD",
            Duration::from_secs(5),
        );

        let err = filter.list_deny_rules().await.unwrap_err();

        assert!(matches!(err, FilterError::Spawn { .. }), "{err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_command_failed() {
        let filter = IptablesFilter::new("false", false, "FORWARD", Duration::from_secs(5));

        let err = filter
            .insert_deny_rule(mac("AA:BB:CC:DD:EE:FF"))
            .await
            .unwrap_err();

        assert!(matches!(err, FilterError::CommandFailed { status: 1, .. }), "{err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_empty_listing_yields_no_rules() {
        let filter = IptablesFilter::new("true", false, "FORWARD", Duration::from_secs(5));

        let rules = filter.list_deny_rules().await.unwrap();

        assert!(rules.is_empty());
    }

    /// Writes an executable script that ignores its arguments and hangs.
    #[cfg(unix)]
    fn hanging_binary() -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = std::env::temp_dir().join(format!("armas_hang_{}", uuid::Uuid::new_v4()));
        std::fs::write(&path, "#!/bin/sh\nsleep 5\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_command_is_timeout() {
        // Arrange
        let binary = hanging_binary();
        let filter = IptablesFilter::new(
            binary.to_string_lossy(),
            false,
            "FORWARD",
            Duration::from_millis(100),
        );

        // Act
        let err = filter.list_deny_rules().await.unwrap_err();

        // Assert
        assert!(
            matches!(err, FilterError::Timeout { timeout, .. } if timeout == Duration::from_millis(100)),
            "{err:?}"
        );
        std::fs::remove_file(&binary).ok();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_command_surfaces_as_block_and_unblock_failure() {
        use crate::application::policy_store::AccessPolicyStore;
        use armas_core::AccessError;

        // Arrange
        let binary = hanging_binary();
        let filter = IptablesFilter::new(
            binary.to_string_lossy(),
            false,
            "FORWARD",
            Duration::from_millis(100),
        );
        let store = AccessPolicyStore::new(std::sync::Arc::new(filter));
        let m = mac("AA:BB:CC:DD:EE:FF");

        // Act
        let block = store.block(m).await.unwrap_err();
        let unblock = store.unblock(m).await.unwrap_err();

        // Assert
        assert!(matches!(block, AccessError::BlockFailed { .. }), "{block:?}");
        assert!(block.to_string().contains("did not finish"), "{block}");
        assert!(matches!(unblock, AccessError::UnblockFailed { .. }), "{unblock:?}");
        std::fs::remove_file(&binary).ok();
    }
}
