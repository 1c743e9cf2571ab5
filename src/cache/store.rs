//! Typed store helpers: hash the payload, then store it.

use serde_json::Value;

use crate::cache::error::{CacheError, CacheResult};
use crate::cache::service::{gunzip, CacheService, StoreOptions, StoreRequest, StoreResponse};
use crate::cache::types::{CacheContent, CacheHash, ContentEncoding};

impl CacheService {
    /// Store UTF-8 text.
    pub fn store_string(&self, text: &str, options: StoreOptions) -> CacheResult<StoreResponse> {
        if text.is_empty() {
            return Err(CacheError::invalid_input("data", "string payload is empty"));
        }
        let hash = CacheHash::new(self.hasher().from_string(text))?;
        self.store(
            StoreRequest::new(CacheContent::String(text.to_string()))
                .hash(hash)
                .options(options),
        )
    }

    /// Store a JSON document, hashing it without the `exclude_fields` keys.
    pub fn store_json(
        &self,
        value: Value,
        exclude_fields: &[&str],
        options: StoreOptions,
    ) -> CacheResult<StoreResponse> {
        let hash = CacheHash::new(self.hasher().from_json(&value, exclude_fields)?)?;
        self.store(StoreRequest::new(CacheContent::Json(value)).hash(hash).options(options))
    }

    /// Store a JSON document, hashing only the field at `field_path`.
    pub fn store_json_field(
        &self,
        value: Value,
        field_path: &str,
        options: StoreOptions,
    ) -> CacheResult<StoreResponse> {
        if field_path.is_empty() {
            return Err(CacheError::invalid_input("json_field", "field path is empty"));
        }
        let hash = CacheHash::new(self.hasher().from_json_field(&value, field_path)?)?;
        self.store(StoreRequest::new(CacheContent::Json(value)).hash(hash).options(options))
    }

    /// Store raw bytes.
    ///
    /// With `gzip` encoding the bytes are kept compressed but hashed
    /// decompressed, so the same payload dedups either way.
    pub fn store_binary(
        &self,
        bytes: Vec<u8>,
        encoding: Option<ContentEncoding>,
        options: StoreOptions,
    ) -> CacheResult<StoreResponse> {
        if bytes.is_empty() {
            return Err(CacheError::invalid_input("data", "binary payload is empty"));
        }
        let hash = match encoding {
            Some(ContentEncoding::Gzip) => self.hasher().from_bytes(&gunzip(&bytes)?),
            None => self.hasher().from_bytes(&bytes),
        };

        let mut request = StoreRequest::new(CacheContent::Binary(bytes))
            .hash(CacheHash::new(hash)?)
            .options(options);
        request.content_encoding = encoding;
        self.store(request)
    }
}
