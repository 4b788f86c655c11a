// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container security/isolation policy: dropped capabilities,
//! no-new-privileges, read-only rootfs, tmpfs overlays.

/// Translates into `docker run` flags or a Nomad task's `config` stanza,
/// depending on which [`crate::runtime::ContainerRuntime`] executes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPolicy {
    pub uid: u32,
    pub gid: u32,
    /// Supplementary group, e.g. `mercure`, granting access to bind mounts.
    pub supplementary_group: Option<String>,
    pub drop_all_capabilities: bool,
    pub no_new_privileges: bool,
    pub read_only_rootfs: bool,
    /// Paths that get a writable tmpfs overlay despite the read-only rootfs.
    pub tmpfs_paths: Vec<String>,
    /// Only `true` when the module's manifest requires root and the
    /// deployment has `support_root_modules = true`.
    pub allow_root: bool,
}

impl SecurityPolicy {
    /// The default policy applied to modules that do not require root.
    pub fn locked_down(uid: u32, gid: u32) -> Self {
        SecurityPolicy {
            uid,
            gid,
            supplementary_group: Some("mercure".to_string()),
            drop_all_capabilities: true,
            no_new_privileges: true,
            read_only_rootfs: true,
            tmpfs_paths: vec!["/tmp".to_string(), "/app/logs".to_string(), "/var/cache/fontconfig".to_string()],
            allow_root: false,
        }
    }

    pub fn allowing_root(mut self) -> Self {
        self.allow_root = true;
        self
    }

    /// Full-privilege policy for short-lived helper containers (e.g. the
    /// ownership-handback chown step) that need `CAP_CHOWN` rather than
    /// the capability set a module gets under [`Self::locked_down`].
    pub fn privileged() -> Self {
        SecurityPolicy {
            uid: 0,
            gid: 0,
            supplementary_group: None,
            drop_all_capabilities: false,
            no_new_privileges: true,
            read_only_rootfs: false,
            tmpfs_paths: Vec::new(),
            allow_root: true,
        }
    }

    /// `docker run` flags implementing this policy.
    pub fn to_docker_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if !self.allow_root {
            let user = match &self.supplementary_group {
                Some(group) => format!("{}:{}", self.uid, group),
                None => format!("{}:{}", self.uid, self.gid),
            };
            args.push("--user".to_string());
            args.push(user);
        }
        if self.drop_all_capabilities {
            args.push("--cap-drop".to_string());
            args.push("ALL".to_string());
        }
        if self.no_new_privileges {
            args.push("--security-opt".to_string());
            args.push("no-new-privileges".to_string());
        }
        if self.read_only_rootfs {
            args.push("--read-only".to_string());
        }
        for path in &self.tmpfs_paths {
            args.push("--tmpfs".to_string());
            args.push(path.clone());
        }
        args
    }
}

#[cfg(test)]
#[path = "security_tests.rs"]
mod tests;
