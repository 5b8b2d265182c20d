//! CLI probe for the repository client.
//!
//! # Responsibility
//! - Verify `alfresco_core` linkage and print the core version.
//! - With `ALFRESCO_URL`/`ALFRESCO_USER` set, connect over the browser
//!   binding and list the root folder's subfolders.
//! - With a database path argument, do the same against a local repository.

use alfresco_core::{
    core_version, init_logging, CmisResult, LocalRepositorySession, LogSettings,
    RepositoryClient, RepositorySession, SessionConfig,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    if let Some(settings) = LogSettings::from_env() {
        if let Err(err) = init_logging(&settings.level, &settings.log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }
    println!("alfresco_core version={}", core_version());

    let outcome = match std::env::args().nth(1) {
        Some(db_path) => LocalRepositorySession::open(&db_path, "admin")
            .and_then(|session| list_root(&RepositoryClient::new(session))),
        None => match SessionConfig::from_env() {
            Some(config) => {
                RepositoryClient::connect(&config).and_then(|client| list_root(&client))
            }
            None => {
                println!("no repository configured; set ALFRESCO_URL and ALFRESCO_USER");
                Ok(())
            }
        },
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!(
                "event=cli_probe module=cli status=error code={}",
                err.code()
            );
            eprintln!("error [{}]: {err}", err.code());
            ExitCode::FAILURE
        }
    }
}

fn list_root<S: RepositorySession>(client: &RepositoryClient<S>) -> CmisResult<()> {
    let info = client.session().repository_info();
    println!(
        "repository id={} product={} {}",
        info.id, info.product_name, info.product_version
    );
    let root = client.root_folder()?;
    for folder in client.list_folders(&root, false)? {
        println!("{}\t{}", folder.id, folder.path);
    }
    Ok(())
}
