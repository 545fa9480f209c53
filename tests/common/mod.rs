//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// An isolated installation: base directory, scratch and output directories
/// and a private config home so no user configuration leaks in.
pub struct Workspace {
    pub temp: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let ws = Self {
            temp: TempDir::new().unwrap(),
        };
        for dir in ["app/scripts", "app/resource/script_queries", "tmp", "out", "home"] {
            fs::create_dir_all(ws.temp.path().join(dir)).unwrap();
        }
        ws
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn base(&self) -> PathBuf {
        self.root().join("app")
    }

    pub fn out(&self) -> PathBuf {
        self.root().join("out")
    }

    pub fn key_dir(&self) -> PathBuf {
        self.base().join("cache/package")
    }

    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.root().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    /// A binary of this crate wired to the workspace.
    pub fn cmd(&self, bin: &str) -> Command {
        let mut cmd = Command::cargo_bin(bin).unwrap();
        cmd.current_dir(self.root())
            .env_remove("TPLPACK_CONFIG")
            .env_remove("TPLPACK_KEY_DIR")
            .env_remove("RUST_LOG")
            .env("HOME", self.root().join("home"))
            .env("XDG_CONFIG_HOME", self.root().join("home"))
            .env("TPLPACK_BASE_PATH", self.base())
            .env("TPLPACK_TEMP_DIR", self.root().join("tmp"))
            .env("TPLPACK_OUTPUT_DIR", self.out());
        cmd
    }

    pub fn genkey(&self, extra: &[&str]) -> Command {
        let mut cmd = self.cmd("genkey");
        cmd.args([
            "--author=Jane Author",
            "--homepage=https://example.org",
            "--email=jane@example.org",
            "--days=30",
        ])
        .args(extra);
        cmd
    }

    /// Install a keypair through the key tool.
    pub fn install_keys(&self) {
        self.genkey(&["--generate"]).assert().success();
    }
}

/// A host template referencing one script and one data query XML.
pub fn host_template_xml() -> String {
    "<cacti>\n\
     <host_template>\n\
     <script_path>&lt;path_cacti&gt;/scripts/ss_host.php</script_path>\n\
     <xml_path>&lt;path_cacti&gt;/resource/script_queries/disk.xml</xml_path>\n\
     </host_template>\n\
     </cacti>\n"
        .to_string()
}

/// Lay down the files [`host_template_xml`] refers to.
pub fn install_dependencies(ws: &Workspace) {
    ws.write("app/scripts/ss_host.php", "<?php echo 1;\n");
    ws.write(
        "app/resource/script_queries/disk.xml",
        "<interface>\n<script_path>|path_cacti|/scripts/disk.sh</script_path>\n</interface>\n",
    );
    ws.write("app/scripts/disk.sh", "#!/bin/sh\ndf -k\n");
}
