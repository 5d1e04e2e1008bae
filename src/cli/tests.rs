//! Unit tests for CLI commands

use crate::cli::{build_container, Cli, Commands};
use crate::config::{ApplicationConfig, ContainerConfig};
use clap::Parser;
use std::path::PathBuf;

#[test]
fn test_serve_command_with_webapps() {
    let cli = Cli::try_parse_from([
        "brrtcontainer",
        "serve",
        "--port",
        "9000",
        "--webapp",
        "/docs=./site",
        "--webapp",
        "=./root.zip",
    ])
    .unwrap();

    match cli.command {
        Commands::Serve {
            config,
            bind,
            port,
            webapps,
        } => {
            assert!(config.is_none());
            assert!(bind.is_none());
            assert_eq!(port, Some(9000));
            assert_eq!(
                webapps,
                vec![
                    ("/docs".to_string(), PathBuf::from("./site")),
                    (String::new(), PathBuf::from("./root.zip")),
                ]
            );
        }
        _ => panic!("Expected Serve command"),
    }
}

#[test]
fn test_serve_rejects_malformed_webapp() {
    assert!(Cli::try_parse_from(["brrtcontainer", "serve", "--webapp", "/docs"]).is_err());
    assert!(Cli::try_parse_from(["brrtcontainer", "serve", "--webapp", "/docs="]).is_err());
}

#[test]
fn test_modules_command() {
    let cli = Cli::try_parse_from([
        "brrtcontainer",
        "modules",
        "--root",
        "lib",
        "--root",
        "vendor.zip",
        "acme.core",
    ])
    .unwrap();

    match cli.command {
        Commands::Modules { roots, name } => {
            assert_eq!(roots, vec![PathBuf::from("lib"), PathBuf::from("vendor.zip")]);
            assert_eq!(name.as_deref(), Some("acme.core"));
        }
        _ => panic!("Expected Modules command"),
    }

    assert!(Cli::try_parse_from(["brrtcontainer", "modules"]).is_err());
}

#[test]
fn test_build_container_deploys_units() {
    let site = tempfile::tempdir().unwrap();
    std::fs::write(site.path().join("index.html"), "hi").unwrap();
    let mut config = ContainerConfig::default();
    config
        .applications
        .push(ApplicationConfig::serving("/docs", site.path()));
    config.applications.push(ApplicationConfig {
        context_path: "/api".to_string(),
        ..ApplicationConfig::default()
    });

    let container = build_container(&config).unwrap();
    assert_eq!(container.applications().len(), 2);
    assert_eq!(container.resolve("/docs/index.html").unwrap().context_path(), "/docs");

    config.applications.push(ApplicationConfig {
        context_path: "/missing".to_string(),
        root: Some(site.path().join("nope")),
        ..ApplicationConfig::default()
    });
    assert!(build_container(&config).is_err());
}
