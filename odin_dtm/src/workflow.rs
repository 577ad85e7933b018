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

use std::{path::PathBuf, sync::Arc};
use chrono::{NaiveDate,Utc};
use tracing::info;

use crate::{
    DtmConfig, OutputLayout, RequestKey,
    errors::{Result,op_failed},
    indices::{IndexSource,index_source_from_config},
    params::{ParameterSet,WorkflowVariant,check_horizon,derive_parameters,validate_request},
    model_service::{ModelService,RemoteModelService},
    dispatch::RunDispatcher,
    collect::ResultCollector,
    assemble::{ArchiveAssembler,RunManifest},
    cache::WorkflowCache
};

/// the DTM2020 workflow: derive parameters, run the model for each epoch and assemble the results
pub struct DtmWorkflow {
    config: Arc<DtmConfig>,
    index_source: Arc<dyn IndexSource>,
    dispatcher: RunDispatcher,
    collector: ResultCollector,
    assembler: ArchiveAssembler,
    cache: WorkflowCache,
}

impl DtmWorkflow {
    pub fn new (config: DtmConfig, index_source: Arc<dyn IndexSource>, model: Arc<dyn ModelService>)->Self {
        let layout = OutputLayout::new( &config.root_dir);
        let dispatcher = RunDispatcher::new( model.clone(), config.max_concurrent, config.request_timeout);
        let collector = ResultCollector::new( model, layout.clone(), config.max_concurrent,
                                              config.request_timeout, config.poll_interval, config.max_wait);
        let assembler = ArchiveAssembler::new( layout.clone(), &config.model_prefix);
        let cache = WorkflowCache::new( layout);

        DtmWorkflow { config: Arc::new(config), index_source, dispatcher, collector, assembler, cache }
    }

    /// create a workflow that uses the configured index source and the remote model service
    pub fn from_config (config: DtmConfig)->Result<Self> {
        let index_source: Arc<dyn IndexSource> = Arc::from( index_source_from_config( &config)?);
        let model: Arc<dyn ModelService> = Arc::new( RemoteModelService::new( &config)?);
        Ok( Self::new( config, index_source, model) )
    }

    pub fn config (&self)->&DtmConfig { &self.config }

    pub fn cache (&self)->&WorkflowCache { &self.cache }

    pub fn full_run_variant (&self)->WorkflowVariant {
        WorkflowVariant::FullRun { horizon_days: self.config.horizon_days }
    }

    /// parameter-only variant: validate the request and compute the day templates for the
    /// request date and the following day
    pub async fn run_parameters (&self, date: &str, altitude: i64)->Result<ParameterSet> {
        let variant = WorkflowVariant::Parameters;
        let req = validate_request( date, altitude, variant, today())?;
        derive_parameters( self.index_source.as_ref(), &req, variant.horizon_days()).await
    }

    /// full-run variant: validate the request and return the path of the final archive
    pub async fn run_workflow (&self, date: &str, altitude: i64)->Result<PathBuf> {
        let variant = self.full_run_variant();
        check_horizon( variant.horizon_days())?;
        let req = validate_request( date, altitude, variant, today())?;
        self.execute( &req).await
    }

    /// run the pipeline for an already validated request, short-circuiting if we have a
    /// cached result
    pub async fn execute (&self, req: &RequestKey)->Result<PathBuf> {
        if let Some(path) = self.cache.get( req) {
            info!("{} cached in {:?}", req, path);
            return Ok(path)
        }

        let _guard = self.cache.lock( req).await;
        if let Some(path) = self.cache.get( req) { // computed while we were waiting for the lock
            info!("{} computed by concurrent request", req);
            return Ok(path)
        }

        info!("computing {}", req);
        let horizon_days = self.config.horizon_days;
        let params = derive_parameters( self.index_source.as_ref(), req, horizon_days).await?;
        let runs = params.expand_runs();

        info!("dispatching {} runs for {}", runs.len(), req);
        let handles = self.dispatcher.dispatch( &runs).await?;

        info!("collecting {} results for {}", handles.len(), req);
        let run_dirs = self.collector.collect( req, &handles).await?;

        let manifest = RunManifest::new( req, horizon_days, params.runs, runs);
        let assembler = self.assembler.clone();
        let key = *req;
        let staged = tokio::task::spawn_blocking( move || assembler.assemble( &key, &run_dirs, &manifest)).await
            .map_err( |e| op_failed!("assembly task failed: {}", e))??;

        let path = self.cache.put( req, &staged)?;
        info!("{} done: {:?}", req, path);
        Ok(path)
    }
}

fn today ()->NaiveDate {
    Utc::now().date_naive()
}
