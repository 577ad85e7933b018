/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client,StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::{
    DtmConfig,
    errors::{Result,dispatch_error,result_error},
    params::RunParameters
};

/// the remote service that executes DTM2020 runs. This is an opaque request/response API -
/// `execute` starts a run and returns its execution id, `fetch_results` returns the result
/// archive once the run is complete
#[async_trait]
pub trait ModelService: Send + Sync {
    async fn execute (&self, run: &RunParameters)->Result<String>;

    /// Ok(None) means the run has not completed yet
    async fn fetch_results (&self, execution_id: &str)->Result<Option<Bytes>>;
}

/// http client for a model service that has `execute?fm=&fl=&alt=&day=&akp1=&akp3=` and
/// `results?execution_id=` endpoints
pub struct RemoteModelService {
    client: Client,
    base_url: String,
    id_field: String,
}

impl RemoteModelService {
    pub fn new (config: &DtmConfig)->Result<Self> {
        let client = Client::builder().timeout( config.request_timeout).build()?;
        let base_url = config.model_url.trim_end_matches('/').to_string();
        Ok( RemoteModelService { client, base_url, id_field: config.execution_id_field.clone() } )
    }
}

#[async_trait]
impl ModelService for RemoteModelService {
    async fn execute (&self, run: &RunParameters)->Result<String> {
        let url = format!("{}/execute", self.base_url);
        let query = [
            ("fm", run.fm.to_string()),
            ("fl", run.fl.to_string()),
            ("alt", run.alt.to_string()),
            ("day", run.day.to_string()),
            ("akp1", run.akp1.to_string()),
            ("akp3", run.akp3.to_string()),
        ];

        let response = self.client.get( &url).query( &query).send().await
            .map_err( |e| dispatch_error!( run.key, "request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err( dispatch_error!( run.key, "response status {}", status))
        }

        let body: Value = response.json().await.map_err( |e| dispatch_error!( run.key, "invalid response: {}", e))?;
        let id = parse_execution_id( &body, &self.id_field)
            .ok_or_else( || dispatch_error!( run.key, "no '{}' in response {}", self.id_field, body))?;
        debug!("run {} dispatched as {}", run.key, id);

        Ok(id)
    }

    async fn fetch_results (&self, execution_id: &str)->Result<Option<Bytes>> {
        let url = format!("{}/results", self.base_url);
        let response = self.client.get( &url).query( &[("execution_id", execution_id)]).send().await
            .map_err( |e| result_error!( execution_id, "request failed: {}", e))?;

        match response.status() {
            StatusCode::OK => {
                let bytes = response.bytes().await.map_err( |e| result_error!( execution_id, "download failed: {}", e))?;
                if bytes.is_empty() { Ok(None) } else { Ok(Some(bytes)) }
            }
            StatusCode::ACCEPTED | StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(None),
            other => Err( result_error!( execution_id, "response status {}", other))
        }
    }
}

/// the execute response is a single element array with an object that holds the execution id
/// (as string or number)
pub fn parse_execution_id (body: &Value, id_field: &str)->Option<String> {
    let obj = match body {
        Value::Array(elems) if elems.len() == 1 => &elems[0],
        _ => return None
    };

    match obj.get( id_field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None
    }
}
