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

use std::{collections::BTreeMap, fs::{self,File}, io::Write, path::{Path,PathBuf}, sync::Arc, time::Duration};
use bytes::Bytes;
use tokio::{sync::Semaphore, task::JoinSet, time::{Instant,sleep,timeout}};
use tracing::{debug,info};
use zip::ZipArchive;

use crate::{
    OutputLayout, Quantity, RequestKey, RunKey, files_in_tree,
    errors::{OdinDtmError,Result,result_error,op_failed},
    dispatch::ExecutionHandle,
    model_service::ModelService
};

/// retrieves and extracts the result archives of dispatched runs. Archives and extracted
/// directories that already exist are re-used
pub struct ResultCollector {
    model: Arc<dyn ModelService>,
    layout: OutputLayout,
    max_concurrent: usize,
    request_timeout: Duration,
    poll_interval: Duration,
    max_wait: Duration,
}

impl ResultCollector {
    pub fn new (model: Arc<dyn ModelService>, layout: OutputLayout, max_concurrent: usize,
                request_timeout: Duration, poll_interval: Duration, max_wait: Duration)->Self {
        ResultCollector { model, layout, max_concurrent: max_concurrent.max(1), request_timeout, poll_interval, max_wait }
    }

    /// collect all runs of a request, returning the extracted directory for each run key
    pub async fn collect (&self, req: &RequestKey, handles: &[ExecutionHandle])->Result<BTreeMap<RunKey,PathBuf>> {
        fs::create_dir_all( self.layout.request_dir( req))?;

        let semaphore = Arc::new( Semaphore::new( self.max_concurrent));
        let mut join_set: JoinSet<Result<(RunKey,PathBuf)>> = JoinSet::new();

        for handle in handles {
            let job = CollectJob {
                model: self.model.clone(),
                handle: handle.clone(),
                archive: self.layout.run_archive( req, &handle.key),
                run_dir: self.layout.run_dir( req, &handle.key),
                request_timeout: self.request_timeout,
                poll_interval: self.poll_interval,
                max_wait: self.max_wait,
            };
            let semaphore = semaphore.clone();

            join_set.spawn( async move {
                let _permit = semaphore.acquire_owned().await.map_err( |e| result_error!( job.handle.key, "{}", e))?;
                job.run().await
            });
        }

        let mut dirs = BTreeMap::new();
        while let Some(res) = join_set.join_next().await {
            let (key, dir) = res.map_err( |e| op_failed!("collect task failed: {}", e))??;
            dirs.insert( key, dir);
        }

        Ok(dirs)
    }
}

/// everything needed to collect a single run, so that it can be moved into its own task
struct CollectJob {
    model: Arc<dyn ModelService>,
    handle: ExecutionHandle,
    archive: PathBuf,
    run_dir: PathBuf,
    request_timeout: Duration,
    poll_interval: Duration,
    max_wait: Duration,
}

impl CollectJob {
    async fn run (self)->Result<(RunKey,PathBuf)> {
        let key = self.handle.key;

        if self.archive.is_file() {
            debug!("archive {:?} already downloaded", self.archive);
        } else {
            let bytes = self.poll_results().await?;
            store_archive( &self.archive, &bytes).map_err( |e| result_error!( key, "cannot store {:?}: {}", self.archive, e))?;
            info!("{} kB saved to {:?}", bytes.len() / 1024, self.archive);
        }

        if self.run_dir.is_dir() {
            debug!("archive {:?} already extracted", self.archive);
        } else {
            let archive = self.archive.clone();
            let run_dir = self.run_dir.clone();
            tokio::task::spawn_blocking( move || extract_archive( &archive, &run_dir)).await
                .map_err( |e| result_error!( key, "extraction task failed: {}", e))?
                .map_err( |e| result_error!( key, "cannot extract {:?}: {}", self.archive, e))?;
            debug!("extracted {:?}", self.run_dir);
        }

        check_run_dir( &key, &self.run_dir)?;
        Ok( (key, self.run_dir) )
    }

    /// poll the results endpoint until the run has completed or we run out of time
    async fn poll_results (&self)->Result<Bytes> {
        let key = self.handle.key;
        let deadline = Instant::now() + self.max_wait;

        loop {
            match timeout( self.request_timeout, self.model.fetch_results( &self.handle.execution_id)).await {
                Ok(Ok(Some(bytes))) => return Ok(bytes),
                Ok(Ok(None)) => {}
                Ok(Err(OdinDtmError::ResultError{msg,..})) => return Err( result_error!( key, "{}", msg)),
                Ok(Err(e)) => return Err( result_error!( key, "{}", e)),
                Err(_) => return Err( result_error!( key, "no response within {:?}", self.request_timeout))
            }

            if Instant::now() + self.poll_interval > deadline {
                return Err( result_error!( key, "execution {} not complete after {:?}", self.handle.execution_id, self.max_wait))
            }
            debug!("run {} not complete yet", key);
            sleep( self.poll_interval).await;
        }
    }
}

/// write to a temp file within the same dir first so that partial downloads never show up as archives
fn store_archive (path: &Path, bytes: &[u8])->Result<()> {
    let dir = path.parent().ok_or( op_failed!("no parent dir for {:?}", path))?;
    let mut file = tempfile::NamedTempFile::new_in( dir)?;
    file.write_all( bytes)?;
    file.flush()?;
    file.persist( path).map_err( |e| e.error)?;
    Ok(())
}

/// extract into `<run_dir>.partial` and rename once complete
pub fn extract_archive (archive: &Path, run_dir: &Path)->Result<()> {
    let partial = run_dir.with_extension("partial");
    if partial.exists() {
        fs::remove_dir_all( &partial)?;
    }
    fs::create_dir_all( &partial)?;

    let mut zip = ZipArchive::new( File::open( archive)?)?;
    zip.extract( &partial)?;

    fs::rename( &partial, run_dir)?;
    Ok(())
}

/// an extracted run has to contain at least one model product
fn check_run_dir (key: &RunKey, run_dir: &Path)->Result<()> {
    let files = files_in_tree( run_dir)?;
    if files.iter().any( |p| Quantity::of_file(p).is_some()) {
        Ok(())
    } else {
        Err( result_error!( key, "no model output in {:?}", run_dir))
    }
}
