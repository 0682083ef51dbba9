//! Blocking client
//!
//! One TCP connection, one request in flight at a time.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};

use crate::error::{RawKvError, Result};
use crate::kvrpc::{
    read_response, write_request, Context, RawDeleteRequest, RawDeleteResponse, RawGetRequest,
    RawGetResponse, RawPutRequest, RawPutResponse, RawScanRequest, RawScanResponse, Request,
    Response,
};

/// Client for the raw key-value API
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    context: Context,
}

impl Client {
    /// Connect to a server
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .map_err(|e| RawKvError::Network(format!("connect failed: {}", e)))?;
        stream.set_nodelay(true)?;
        let read_stream = stream.try_clone()?;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            context: Context::default(),
        })
    }

    /// Context attached to every following request
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Send one request and wait for its response
    pub fn call(&mut self, request: &Request) -> Result<Response> {
        write_request(&mut self.writer, request)?;
        let response = read_response(&mut self.reader)?;
        if response.message_type() != request.message_type() {
            return Err(RawKvError::Protocol(format!(
                "expected {:?} response, got {:?}",
                request.message_type(),
                response.message_type()
            )));
        }
        Ok(response)
    }

    pub fn raw_get(&mut self, cf: &str, key: &[u8]) -> Result<RawGetResponse> {
        let request = Request::RawGet(RawGetRequest {
            context: self.context.clone(),
            cf: cf.to_string(),
            key: key.to_vec(),
        });
        match self.call(&request)? {
            Response::RawGet(resp) => Ok(resp),
            other => Err(unexpected(&other)),
        }
    }

    pub fn raw_put(&mut self, cf: &str, key: &[u8], value: &[u8]) -> Result<RawPutResponse> {
        let request = Request::RawPut(RawPutRequest {
            context: self.context.clone(),
            cf: cf.to_string(),
            key: key.to_vec(),
            value: value.to_vec(),
        });
        match self.call(&request)? {
            Response::RawPut(resp) => Ok(resp),
            other => Err(unexpected(&other)),
        }
    }

    pub fn raw_delete(&mut self, cf: &str, key: &[u8]) -> Result<RawDeleteResponse> {
        let request = Request::RawDelete(RawDeleteRequest {
            context: self.context.clone(),
            cf: cf.to_string(),
            key: key.to_vec(),
        });
        match self.call(&request)? {
            Response::RawDelete(resp) => Ok(resp),
            other => Err(unexpected(&other)),
        }
    }

    pub fn raw_scan(&mut self, cf: &str, start_key: &[u8], limit: u32) -> Result<RawScanResponse> {
        let request = Request::RawScan(RawScanRequest {
            context: self.context.clone(),
            cf: cf.to_string(),
            start_key: start_key.to_vec(),
            limit,
        });
        match self.call(&request)? {
            Response::RawScan(resp) => Ok(resp),
            other => Err(unexpected(&other)),
        }
    }

    /// Health check
    pub fn ping(&mut self) -> Result<()> {
        self.call(&Request::Ping).map(|_| ())
    }
}

fn unexpected(response: &Response) -> RawKvError {
    RawKvError::Protocol(format!("unexpected {:?} response", response.message_type()))
}
