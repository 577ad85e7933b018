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

//! the http surface of the workflow: `GET /run_workflow/` and `GET /run_parameters/`

use std::{path::Path, sync::Arc};
use axum::{
    Json, Router,
    body::Body,
    extract::{Query,State,rejection::QueryRejection},
    response::{IntoResponse,Response},
    routing::get
};
use http::{HeaderMap, HeaderValue, StatusCode, header};
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::ReaderStream;
use tower_http::cors::CorsLayer;
use tracing::{info,warn,error};

use crate::{
    MIN_ALTITUDE,
    errors::{OdinDtmError,Result},
    workflow::DtmWorkflow
};

// serde only takes functions for defaults
fn default_altitude ()->i64 { MIN_ALTITUDE as i64 }

#[derive(Deserialize,Debug)]
pub struct WorkflowQuery {
    pub date: String,

    #[serde(default = "default_altitude")]
    pub altitude: i64,
}

pub fn router (workflow: Arc<DtmWorkflow>)->Router {
    Router::new()
        .route("/run_workflow/", get(run_workflow_handler))
        .route("/run_parameters/", get(run_parameters_handler))
        .layer( CorsLayer::permissive())
        .with_state( workflow)
}

async fn run_workflow_handler (State(workflow): State<Arc<DtmWorkflow>>, query: std::result::Result<Query<WorkflowQuery>,QueryRejection>)->Response {
    let q = match query_params( query) {
        Ok(q) => q,
        Err(e) => return e.into_response()
    };
    info!("run_workflow request {:?}", q);

    let res = match workflow.run_workflow( &q.date, q.altitude).await {
        Ok(path) => archive_response( &path, &archive_name( &q)).await,
        Err(e) => Err(e)
    };
    res.into_response()
}

async fn run_parameters_handler (State(workflow): State<Arc<DtmWorkflow>>, query: std::result::Result<Query<WorkflowQuery>,QueryRejection>)->Response {
    let q = match query_params( query) {
        Ok(q) => q,
        Err(e) => return e.into_response()
    };
    info!("run_parameters request {:?}", q);

    workflow.run_parameters( &q.date, q.altitude).await
        .map( Json)
        .into_response()
}

/// malformed or missing query parameters are input errors like any other
fn query_params (query: std::result::Result<Query<WorkflowQuery>,QueryRejection>)->Result<WorkflowQuery> {
    query.map( |Query(q)| q).map_err( |e| OdinDtmError::InputValidation( e.body_text()))
}

/// the download name of a workflow archive
pub fn archive_name (q: &WorkflowQuery)->String {
    format!("dtm2020_{}_{}.zip", q.date, q.altitude)
}

/// stream the archive file instead of reading it into memory
async fn archive_response (path: &Path, fname: &str)->Result<Response> {
    let file = tokio::fs::File::open( path).await?;

    let mut headers = HeaderMap::new();
    headers.insert( header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str( &format!("attachment; filename=\"{fname}\""))
        .map_err( |e| OdinDtmError::OpFailedError( format!("invalid archive name {}: {}", fname, e)))?;
    headers.insert( header::CONTENT_DISPOSITION, disposition);

    let body = Body::from_stream( ReaderStream::new( file));
    Ok( (StatusCode::OK, headers, body).into_response() )
}

impl IntoResponse for OdinDtmError {
    fn into_response (self)->Response {
        if self.is_client_error() {
            warn!("rejected request: {}", self);
            (StatusCode::BAD_REQUEST, Json( json!({ "detail": self.to_string() }))).into_response()
        } else {
            error!("workflow failed: {}", self);
            let body = json!({ "detail": "workflow execution failed", "cause": self.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}
