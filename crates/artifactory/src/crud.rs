//! Generic REST-backed resource operations.
//!
//! A [`RestResource`] is parametrised by three functions over its payload
//! type: `construct` (an empty payload stamped with fixed fields such as the
//! repository class), `unpack` (declared configuration → payload and id) and
//! `pack` (payload → state). Every create and update is followed by a read
//! so that values the server fills in land in state.

use crate::client::Client;
use crate::error::Error;
use crate::retry::{MergeRace, StatusIs};
use anyhow::Result;
use declarative::{Context, Marshal, ResourceData, ResourceOps};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

const REPOSITORIES: &str = "artifactory/api/repositories";

type ConstructFn<P> = Box<dyn Fn() -> P + Send + Sync>;
type UnpackFn<P> = Box<dyn Fn(&ResourceData) -> (P, String) + Send + Sync>;
type PackFn<P> = Box<dyn Fn(&P, &mut ResourceData) -> declarative::Result<()> + Send + Sync>;

/// Where a resource lives and which methods create and update it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// `artifactory/api/repositories/{key}`: PUT creates, POST updates.
    /// Both retry on the descriptor merge race.
    Repositories,
    /// An Xray collection: POST to the collection creates, PUT to the item
    /// updates.
    Xray(&'static str),
}

impl Endpoint {
    pub fn item(&self, id: &str) -> String {
        match self {
            Self::Repositories => format!("{REPOSITORIES}/{id}"),
            Self::Xray(collection) => format!("{collection}/{id}"),
        }
    }
}

/// Resource operations over a JSON REST endpoint
pub struct RestResource<P> {
    endpoint: Endpoint,
    construct: ConstructFn<P>,
    unpack: UnpackFn<P>,
    pack: PackFn<P>,
    exists: bool,
}

impl<P> RestResource<P>
where
    P: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(
        endpoint: Endpoint,
        construct: impl Fn() -> P + Send + Sync + 'static,
        unpack: impl Fn(&ResourceData) -> (P, String) + Send + Sync + 'static,
        pack: impl Fn(&P, &mut ResourceData) -> declarative::Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            endpoint,
            construct: Box::new(construct),
            unpack: Box::new(unpack),
            pack: Box::new(pack),
            exists: false,
        }
    }

    /// Probe with HEAD before refreshing
    #[must_use]
    pub fn with_exists(mut self) -> Self {
        self.exists = true;
        self
    }

    fn write(&self, ctx: &Context, client: &Client, payload: &P, id: &str, update: bool) -> crate::Result<()> {
        let request = match (self.endpoint, update) {
            (Endpoint::Repositories, false) => client.put(self.endpoint.item(id)).retry_if(MergeRace),
            (Endpoint::Repositories, true) => client.post(self.endpoint.item(id)).retry_if(MergeRace),
            (Endpoint::Xray(collection), false) => client.post(collection),
            (Endpoint::Xray(_), true) => client.put(self.endpoint.item(id)),
        };
        request.json(payload)?.cancel(&ctx.cancel).send()?;
        Ok(())
    }

    /// Decode `body` over a freshly constructed payload, so fields the server
    /// leaves out keep their constructed values
    fn decode(&self, url: String, body: &str) -> crate::Result<P> {
        let fetched: Value =
            serde_json::from_str(body).map_err(|source| Error::Decode { url: url.clone(), source })?;
        let mut merged = serde_json::to_value((self.construct)())?;
        match (merged.as_object_mut(), fetched) {
            (Some(target), Value::Object(source)) => target.extend(source),
            (_, other) => merged = other,
        }
        serde_json::from_value(merged).map_err(|source| Error::Decode { url, source })
    }
}

impl<P> RestResource<P>
where
    P: Marshal + Serialize + DeserializeOwned,
{
    /// Resource whose payload is fully described by its field table.
    /// `id_key` names the attribute holding the id.
    pub fn marshalled(endpoint: Endpoint, id_key: &'static str, construct: impl Fn() -> P + Send + Sync + 'static) -> Self {
        let construct = Arc::new(construct);
        let fresh = Arc::clone(&construct);
        Self::new(
            endpoint,
            move || (*construct)(),
            move |d| {
                let mut payload = (*fresh)();
                P::fields().unpack_into(&mut payload, d);
                (payload, d.get_string(id_key, false))
            },
            |payload, d| P::fields().pack(payload, d),
        )
    }
}

impl<P> ResourceOps<Client> for RestResource<P>
where
    P: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn create(&self, ctx: &Context, client: &Client, d: &mut ResourceData) -> Result<()> {
        ctx.check_cancelled()?;
        let (payload, id) = (self.unpack)(d);
        log::debug!("creating {id}");
        self.write(ctx, client, &payload, &id, false)?;
        d.set_id(id);
        self.read(ctx, client, d)
    }

    fn read(&self, ctx: &Context, client: &Client, d: &mut ResourceData) -> Result<()> {
        ctx.check_cancelled()?;
        let path = self.endpoint.item(d.id());
        log::debug!("reading {}", d.id());
        let response = match client.get(&path).cancel(&ctx.cancel).send() {
            Ok(response) => response,
            Err(e) if e.is_not_found() => {
                log::info!("{} not found on the server, treating it as absent", d.id());
                d.clear_id();
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let payload = self.decode(format!("{}/{path}", client.base_url()), &response.body)?;
        (self.pack)(&payload, d)?;
        Ok(())
    }

    fn update(&self, ctx: &Context, client: &Client, d: &mut ResourceData) -> Result<()> {
        ctx.check_cancelled()?;
        let (payload, _) = (self.unpack)(d);
        let id = d.id().to_string();
        log::debug!("updating {id}");
        self.write(ctx, client, &payload, &id, true)?;
        self.read(ctx, client, d)
    }

    fn delete(&self, ctx: &Context, client: &Client, d: &mut ResourceData) -> Result<()> {
        ctx.check_cancelled()?;
        log::debug!("deleting {}", d.id());
        match client.delete(self.endpoint.item(d.id())).cancel(&ctx.cancel).send() {
            Ok(_) => {}
            Err(e) if e.is_not_found() => log::info!("{} was already deleted", d.id()),
            Err(e) => return Err(e.into()),
        }
        d.clear_id();
        Ok(())
    }

    fn exists(&self, ctx: &Context, client: &Client, d: &ResourceData) -> Result<bool> {
        if !self.exists {
            return Ok(true);
        }
        log::debug!("checking {} exists", d.id());
        let probe = client
            .head(self.endpoint.item(d.id()))
            .retry_if(StatusIs(400))
            .cancel(&ctx.cancel)
            .send();
        match probe {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.status(), Some(400 | 404)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
