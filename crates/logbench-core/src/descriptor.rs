//! Mobile packaging descriptor of the notes application.
//!
//! [`PackagingDescriptor`] mirrors the configuration file the native
//! packaging tool reads at build time. It is a plain immutable value: build
//! it with [`PackagingDescriptor::logseq`] or [`load`](PackagingDescriptor::load)
//! it once at startup and pass it around by reference.
//!
//! The descriptor does not validate its values; the packaging tool rejects
//! what it cannot use. [`distribution_warnings`](PackagingDescriptor::distribution_warnings)
//! only lists development settings that should not ship.
//!
//! # Example
//!
//! ```
//! use logbench_core::descriptor::PackagingDescriptor;
//!
//! let descriptor = PackagingDescriptor::logseq();
//! assert_eq!(descriptor.app_id, "com.logseq.app");
//!
//! let release = descriptor.for_distribution();
//! assert!(release.server.is_none());
//! assert!(release.distribution_warnings().is_empty());
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from reading or writing a descriptor file.
#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a packaging descriptor: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Splash screen plugin options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplashScreen {
    /// How long the splash stays up, in milliseconds.
    pub launch_show_duration: u32,
    pub launch_auto_hide: bool,
    pub android_scale_type: String,
    pub splash_immersive: bool,
    pub background_color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugins {
    #[serde(rename = "SplashScreen")]
    pub splash_screen: SplashScreen,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IosOptions {
    pub scheme: String,
}

/// Live-reload server of a development build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerOptions {
    pub url: String,
    pub cleartext: bool,
}

/// The packaging configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagingDescriptor {
    pub app_id: String,
    pub app_name: String,
    pub bundled_web_runtime: bool,
    /// Directory of the built web assets.
    pub web_dir: String,
    pub plugins: Plugins,
    pub ios: IosOptions,
    /// Development only; strip with [`for_distribution`](Self::for_distribution).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerOptions>,
}

/// A development setting present in a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistributionWarning {
    LiveReloadServer { url: String },
    Cleartext,
}

impl fmt::Display for DistributionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionWarning::LiveReloadServer { url } => {
                write!(f, "live-reload server {url} must be removed before distribution")
            }
            DistributionWarning::Cleartext => f.write_str("cleartext traffic is enabled"),
        }
    }
}

impl PackagingDescriptor {
    /// The notes application's descriptor, including its development
    /// live-reload server.
    pub fn logseq() -> Self {
        Self {
            app_id: "com.logseq.app".to_string(),
            app_name: "Logseq".to_string(),
            bundled_web_runtime: false,
            web_dir: "public".to_string(),
            plugins: Plugins {
                splash_screen: SplashScreen {
                    launch_show_duration: 3000,
                    launch_auto_hide: false,
                    android_scale_type: "CENTER_CROP".to_string(),
                    splash_immersive: false,
                    background_color: "#002b36".to_string(),
                },
            },
            ios: IosOptions {
                scheme: "Logseq".to_string(),
            },
            server: Some(ServerOptions {
                url: "http://10.233.233.114:3001".to_string(),
                cleartext: true,
            }),
        }
    }

    /// Reads a JSON descriptor file.
    pub fn load(path: &Path) -> Result<Self, DescriptorError> {
        let text = std::fs::read_to_string(path).map_err(|source| DescriptorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| DescriptorError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the descriptor. A `.ts` path gets the TypeScript module form,
    /// anything else JSON.
    pub fn save(&self, path: &Path) -> Result<(), DescriptorError> {
        let contents = if path.extension().is_some_and(|e| e == "ts") {
            self.to_typescript()
        } else {
            self.to_json_pretty()
        };
        std::fs::write(path, contents).map_err(|source| DescriptorError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_json_pretty(&self) -> String {
        // A tree of strings, bools and integers always serializes.
        serde_json::to_string_pretty(self).unwrap_or_default() + "\n"
    }

    /// The descriptor as a `capacitor.config.ts` module.
    pub fn to_typescript(&self) -> String {
        let body = serde_json::to_string_pretty(self).unwrap_or_default();
        format!(
            "import {{ CapacitorConfig }} from '@capacitor/cli';\n\n\
             const config: CapacitorConfig = {body};\n\n\
             export = config;\n"
        )
    }

    /// A copy without development-only settings.
    pub fn for_distribution(&self) -> Self {
        Self {
            server: None,
            ..self.clone()
        }
    }

    /// Development settings that should not ship. Advisory only.
    pub fn distribution_warnings(&self) -> Vec<DistributionWarning> {
        let mut warnings = Vec::new();
        if let Some(server) = &self.server {
            warnings.push(DistributionWarning::LiveReloadServer {
                url: server.url.clone(),
            });
            if server.cleartext {
                warnings.push(DistributionWarning::Cleartext);
            }
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_uses_packaging_tool_keys() {
        let json = serde_json::to_value(PackagingDescriptor::logseq()).unwrap();
        assert_eq!(json["appId"], "com.logseq.app");
        assert_eq!(json["appName"], "Logseq");
        assert_eq!(json["bundledWebRuntime"], false);
        assert_eq!(json["webDir"], "public");
        let splash = &json["plugins"]["SplashScreen"];
        assert_eq!(splash["launchShowDuration"], 3000);
        assert_eq!(splash["launchAutoHide"], false);
        assert_eq!(splash["androidScaleType"], "CENTER_CROP");
        assert_eq!(splash["splashImmersive"], false);
        assert_eq!(splash["backgroundColor"], "#002b36");
        assert_eq!(json["ios"]["scheme"], "Logseq");
        assert_eq!(json["server"]["url"], "http://10.233.233.114:3001");
        assert_eq!(json["server"]["cleartext"], true);
    }

    #[test]
    fn distribution_copy_drops_server_only() {
        let dev = PackagingDescriptor::logseq();
        let release = dev.for_distribution();
        assert!(release.server.is_none());
        assert_eq!(release.plugins, dev.plugins);
        assert!(dev.server.is_some());

        let json = serde_json::to_value(&release).unwrap();
        assert!(json.get("server").is_none());
    }

    #[test]
    fn warnings_are_advisory() {
        let warnings = PackagingDescriptor::logseq().distribution_warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].to_string().contains("10.233.233.114:3001"));
        assert_eq!(warnings[1], DistributionWarning::Cleartext);
    }

    #[test]
    fn save_and_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capacitor.config.json");
        let descriptor = PackagingDescriptor::logseq();
        descriptor.save(&path).unwrap();
        assert_eq!(PackagingDescriptor::load(&path).unwrap(), descriptor);
    }

    #[test]
    fn typescript_module_form() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capacitor.config.ts");
        PackagingDescriptor::logseq().for_distribution().save(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("import { CapacitorConfig } from '@capacitor/cli';"));
        assert!(text.contains("\"appId\": \"com.logseq.app\""));
        assert!(text.trim_end().ends_with("export = config;"));
        assert!(!text.contains("server"));
    }

    #[test]
    fn load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            PackagingDescriptor::load(&missing),
            Err(DescriptorError::Io { .. })
        ));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"appId": "x"}"#).unwrap();
        assert!(matches!(
            PackagingDescriptor::load(&bad),
            Err(DescriptorError::Parse { .. })
        ));
    }
}
