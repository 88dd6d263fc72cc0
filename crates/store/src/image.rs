use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::collection::{Collection, CollectionView, StoredCollection};
use crate::error::{StoreError, StoreResult};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseImage {
    name: String,
    version: u32,
    #[serde(default)]
    collections: BTreeMap<String, StoredCollection>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageView<'a> {
    name: &'a str,
    version: u32,
    collections: BTreeMap<&'a str, CollectionView<'a>>,
}

/// Parse a stored image. Any defect makes the store unavailable.
pub(crate) fn decode(name: &str, bytes: &[u8]) -> StoreResult<(u32, BTreeMap<String, Collection>)> {
    let image: DatabaseImage = serde_json::from_slice(bytes)
        .map_err(|e| StoreError::StorageUnavailable(format!("image for `{name}` is corrupt: {e}")))?;
    if image.name != name {
        return Err(StoreError::StorageUnavailable(format!(
            "image for `{name}` belongs to `{}`",
            image.name
        )));
    }
    let mut collections = BTreeMap::new();
    for (cname, stored) in image.collections {
        let collection = Collection::from_stored(&cname, stored).map_err(|e| {
            StoreError::StorageUnavailable(format!("collection `{cname}` in `{name}` is corrupt: {e}"))
        })?;
        collections.insert(cname, collection);
    }
    Ok((image.version, collections))
}

pub(crate) fn encode(name: &str, version: u32, collections: &BTreeMap<String, Arc<Collection>>) -> StoreResult<Vec<u8>> {
    let view = ImageView {
        name,
        version,
        collections: collections.iter().map(|(n, c)| (n.as_str(), c.view())).collect(),
    };
    serde_json::to_vec(&view).map_err(|e| StoreError::StorageFault(format!("cannot serialize `{name}`: {e}")))
}
