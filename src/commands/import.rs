use super::Session;
use crate::Context;
use crate::cli::ImportArgs;
use crate::ui;
use anyhow::{Context as _, Result, bail};
use artifactory::Client;
use declarative::Address;

/// Read the server object `id` into state at `address`
pub fn import_into(session: &mut Session, client: &Client, address: &Address, id: &str) -> Result<()> {
    if let Some(existing) = session.state.get(address) {
        bail!("{address} is already managed (id {})", existing.id);
    }
    let instance = declarative::import(address, id, session.provider.resources(), client, &session.host)
        .with_context(|| format!("Could not import {id} into {address}"))?;
    session.state.upsert(instance);
    session.save_state()
}

pub fn run(ctx: &Context, args: &ImportArgs) -> Result<()> {
    let address = Address::new(&args.resource_type, &args.name);
    let mut session = Session::open(ctx)?;
    let client = session.connect()?;
    import_into(&mut session, &client, &address, &args.id)?;

    ui::success(&format!("Imported {} into {address}", args.id));
    if !session.config.resources.iter().any(|r| r.address == address) {
        ui::warn(&format!("{address} is not declared; the next apply will destroy it"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::apply::build_plan;
    use crate::commands::testing::{REPOSITORIES, client, session};
    use artifactory::transport::MockTransport;
    use serde_json::json;

    #[test]
    fn test_import_adopts_existing_repository() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockTransport::new();
        mock.insert(
            "artifactory/api/repositories/npm-local",
            json!({
                "key": "npm-local",
                "rclass": "local",
                "packageType": "npm",
                "description": "internal packages",
            }),
        );
        let mut session = session(REPOSITORIES, dir.path());
        let client = client(&session, &mock);
        let address = Address::new("artifactory_local_npm_repository", "npm");

        import_into(&mut session, &client, &address, "npm-local").unwrap();
        assert_eq!(session.state.get(&address).unwrap().id, "npm-local");

        let plan = build_plan(&session, Some("artifactory_local_npm_repository")).unwrap();
        assert_eq!(plan.summary().creates, 0);

        let err = import_into(&mut session, &client, &address, "npm-local").unwrap_err();
        assert!(err.to_string().contains("already managed"));
    }

    #[test]
    fn test_import_missing_object_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockTransport::new();
        let mut session = session(REPOSITORIES, dir.path());
        let client = client(&session, &mock);
        let address = Address::new("artifactory_local_npm_repository", "npm");

        assert!(import_into(&mut session, &client, &address, "npm-local").is_err());
        assert!(session.state.is_empty());
    }
}
