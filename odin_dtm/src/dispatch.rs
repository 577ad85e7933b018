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

use std::{collections::HashMap, sync::Arc, time::Duration};
use serde::Serialize;
use tokio::{sync::Semaphore, task::JoinSet, time::timeout};
use tracing::info;

use crate::{
    RunKey,
    errors::{OdinDtmError,Result,dispatch_error,op_failed},
    model_service::ModelService,
    params::RunParameters
};

/// the remote execution id of a dispatched run
#[derive(Debug,Clone,PartialEq,Eq,Serialize)]
pub struct ExecutionHandle {
    pub key: RunKey,
    pub execution_id: String,
}

/// submits runs to the model service with bounded concurrency
pub struct RunDispatcher {
    model: Arc<dyn ModelService>,
    max_concurrent: usize,
    request_timeout: Duration,
}

impl RunDispatcher {
    pub fn new (model: Arc<dyn ModelService>, max_concurrent: usize, request_timeout: Duration)->Self {
        RunDispatcher { model, max_concurrent: max_concurrent.max(1), request_timeout }
    }

    /// dispatch all runs and return their handles in the order of `runs`. Any failure aborts
    /// the whole dispatch (outstanding requests are cancelled)
    pub async fn dispatch (&self, runs: &[RunParameters])->Result<Vec<ExecutionHandle>> {
        let semaphore = Arc::new( Semaphore::new( self.max_concurrent));
        let mut join_set: JoinSet<Result<ExecutionHandle>> = JoinSet::new();

        for run in runs {
            let run = run.clone();
            let model = self.model.clone();
            let semaphore = semaphore.clone();
            let request_timeout = self.request_timeout;

            join_set.spawn( async move {
                let _permit = semaphore.acquire_owned().await.map_err( |e| dispatch_error!( run.key, "{}", e))?;

                match timeout( request_timeout, model.execute( &run)).await {
                    Ok(Ok(execution_id)) => Ok( ExecutionHandle { key: run.key, execution_id }),
                    Ok(Err(e @ OdinDtmError::DispatchError{..})) => Err(e),
                    Ok(Err(e)) => Err( dispatch_error!( run.key, "{}", e)),
                    Err(_) => Err( dispatch_error!( run.key, "no response within {:?}", request_timeout))
                }
            });
        }

        // completion order is arbitrary, hence we key the handles
        let mut handles: HashMap<RunKey,ExecutionHandle> = HashMap::with_capacity( runs.len());
        while let Some(res) = join_set.join_next().await {
            let handle = res.map_err( |e| op_failed!("dispatch task failed: {}", e))??;
            info!("run {} -> execution {}", handle.key, handle.execution_id);
            handles.insert( handle.key, handle);
        }

        runs.iter()
            .map( |run| handles.remove( &run.key).ok_or( dispatch_error!( run.key, "duplicate run key")))
            .collect()
    }
}
