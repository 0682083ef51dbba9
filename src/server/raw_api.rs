//! Raw API
//!
//! Stateless translation from raw requests to storage calls. Failures are
//! reported in each response's `error` field; absence is not a failure.

use std::sync::Arc;

use crate::kvrpc::{
    KvPair, MAX_PAYLOAD_SIZE, RawDeleteRequest, RawDeleteResponse, RawGetRequest, RawGetResponse, RawPutRequest,
    RawPutResponse, RawScanRequest, RawScanResponse, Request, Response,
};
use crate::storage::{Modify, Storage};

/// Encoded size a scan response may reach, leaving room for its envelope
pub const SCAN_BYTE_BUDGET: usize = MAX_PAYLOAD_SIZE as usize - 64 * 1024;

/// Encoding overhead of one pair: two length prefixes
const PAIR_OVERHEAD: usize = 16;

/// Request handler for the raw key-value API
#[derive(Clone)]
pub struct RawApi {
    storage: Arc<dyn Storage>,
    scan_budget: usize,
}

impl RawApi {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            scan_budget: SCAN_BYTE_BUDGET,
        }
    }

    /// Cap scan responses at `bytes` of pair data instead of
    /// [`SCAN_BYTE_BUDGET`]
    pub fn with_scan_budget(mut self, bytes: usize) -> Self {
        self.scan_budget = bytes.min(SCAN_BYTE_BUDGET);
        self
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Route a request to its handler
    pub fn handle(&self, request: Request) -> Response {
        match request {
            Request::RawGet(req) => Response::RawGet(self.raw_get(req)),
            Request::RawPut(req) => Response::RawPut(self.raw_put(req)),
            Request::RawDelete(req) => Response::RawDelete(self.raw_delete(req)),
            Request::RawScan(req) => Response::RawScan(self.raw_scan(req)),
            Request::Ping => Response::Pong,
        }
    }

    /// Value of `req.key` in `req.cf`
    pub fn raw_get(&self, req: RawGetRequest) -> RawGetResponse {
        let mut resp = RawGetResponse::default();

        let reader = match self.storage.reader(&req.context) {
            Ok(reader) => reader,
            Err(e) => {
                resp.error = e.to_string();
                return resp;
            }
        };

        match reader.get_cf(&req.cf, &req.key) {
            Ok(Some(value)) => resp.value = value,
            Ok(None) => resp.not_found = true,
            Err(e) => resp.error = e.to_string(),
        }
        resp
    }

    /// Store `req.value` under `req.key` in `req.cf`
    pub fn raw_put(&self, req: RawPutRequest) -> RawPutResponse {
        let batch = vec![Modify::Put {
            cf: req.cf,
            key: req.key,
            value: req.value,
        }];

        match self.storage.write(&req.context, batch) {
            Ok(()) => RawPutResponse::default(),
            Err(e) => RawPutResponse {
                error: e.to_string(),
            },
        }
    }

    /// Remove `req.key` from `req.cf`; removing an absent key succeeds
    pub fn raw_delete(&self, req: RawDeleteRequest) -> RawDeleteResponse {
        let batch = vec![Modify::Delete {
            cf: req.cf,
            key: req.key,
        }];

        match self.storage.write(&req.context, batch) {
            Ok(()) => RawDeleteResponse::default(),
            Err(e) if e.is_key_not_found() => RawDeleteResponse::default(),
            Err(e) => RawDeleteResponse {
                error: e.to_string(),
            },
        }
    }

    /// Up to `req.limit` pairs of `req.cf` starting at `req.start_key`
    ///
    /// The result is cut short once the pairs would outgrow the scan byte
    /// budget, so it always fits in one frame. The first pair is returned
    /// regardless; callers resume after the last key they got.
    pub fn raw_scan(&self, req: RawScanRequest) -> RawScanResponse {
        let mut resp = RawScanResponse::default();

        let reader = match self.storage.reader(&req.context) {
            Ok(reader) => reader,
            Err(e) => {
                resp.error = e.to_string();
                return resp;
            }
        };
        let mut iter = match reader.iter_cf(&req.cf) {
            Ok(iter) => iter,
            Err(e) => {
                resp.error = e.to_string();
                return resp;
            }
        };

        let limit = req.limit as usize;
        let mut kvs = Vec::with_capacity(limit.min(1024));
        let mut bytes = 0usize;
        iter.seek(&req.start_key);
        while iter.valid() && kvs.len() < limit {
            let value = match iter.value() {
                Ok(value) => value,
                Err(e) => {
                    resp.error = e.to_string();
                    return resp;
                }
            };
            let size = PAIR_OVERHEAD + iter.key().len() + value.len();
            if !kvs.is_empty() && bytes + size > self.scan_budget {
                tracing::debug!(
                    "scan of cf {:?} cut at {} pairs ({} bytes)",
                    req.cf,
                    kvs.len(),
                    bytes
                );
                break;
            }
            bytes += size;
            kvs.push(KvPair {
                key: iter.key().to_vec(),
                value,
            });
            iter.next();
        }
        iter.close();

        tracing::trace!("scan of cf {:?} returned {} pairs", req.cf, kvs.len());
        resp.kvs = kvs;
        resp
    }
}
