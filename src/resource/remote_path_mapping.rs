//! Remote path mappings
//!
//! Identified by the pair (remote path, download-client host), so one
//! remote path may be mapped differently per host. The local path is the
//! only setting.

use super::{KindSpec, shape};
use arrclient::{Dialect, ResourceKind};
use declarative::{DesiredResource, ScalarSpec};
use serde_json::{Map, Value};

const SCALARS: &[ScalarSpec] = &[ScalarSpec::text("localPath")];

pub struct RemotePathMappings;

impl KindSpec for RemotePathMappings {
    fn kind(&self) -> ResourceKind {
        ResourceKind::RemotePathMapping
    }

    fn scalars(&self, _dialect: Dialect) -> &'static [ScalarSpec] {
        SCALARS
    }

    fn identity_keys(&self) -> &'static [&'static str] {
        &["remotePath", "host"]
    }

    fn identity(&self, wire: &Value) -> (String, String) {
        (shape::text(wire, "remotePath"), shape::text(wire, "host"))
    }

    fn write_identity(&self, _dialect: Dialect, desired: &DesiredResource, payload: &mut Map<String, Value>) {
        payload.insert("remotePath".into(), desired.name.clone().into());
        payload
            .entry("host")
            .or_insert_with(|| desired.implementation.clone().into());
    }

    fn implementation_label(&self) -> Option<&'static str> {
        Some("host")
    }
}
