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

use std::{collections::BTreeMap, fs::{self,File}, io, path::{Path,PathBuf}};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug,info};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::{
    OutputLayout, Quantity, RequestKey, RunKey, FINAL_ARCHIVE, files_in_tree, entries_in_tree,
    errors::{Result,assembly_error},
    params::{DayTemplate,RunParameters}
};

/// the parameter record stored as `final/inputs_runs.json`
#[derive(Debug,Clone,Serialize)]
pub struct RunManifest {
    pub date: NaiveDate,
    pub altitude: u32,
    pub horizon_days: u32,
    pub days: Vec<DayTemplate>,
    pub runs: Vec<RunParameters>,
}

impl RunManifest {
    pub fn new (req: &RequestKey, horizon_days: u32, days: Vec<DayTemplate>, runs: Vec<RunParameters>)->Self {
        RunManifest { date: req.date, altitude: req.altitude, horizon_days, days, runs }
    }
}

/// regroups extracted run products by quantity and packs them into the deliverable archive
#[derive(Debug,Clone)]
pub struct ArchiveAssembler {
    layout: OutputLayout,
    model_prefix: String,
}

impl ArchiveAssembler {
    pub fn new (layout: OutputLayout, model_prefix: impl ToString)->Self {
        ArchiveAssembler { layout, model_prefix: model_prefix.to_string() }
    }

    /// build `final/` from the extracted run dirs and pack it. The archive is written to a
    /// staging path (`final_output.zip.partial`) that is returned - publishing it is up to the caller
    pub fn assemble (&self, req: &RequestKey, run_dirs: &BTreeMap<RunKey,PathBuf>, manifest: &RunManifest)->Result<PathBuf> {
        let final_dir = self.layout.final_dir( req);
        self.build_final_dir( &final_dir, run_dirs)
            .map_err( |e| assembly_error!("cannot populate {:?}: {}", final_dir, e))?;

        let manifest_path = self.layout.manifest( req);
        let json = serde_json::to_string_pretty( manifest)?;
        fs::write( &manifest_path, json).map_err( |e| assembly_error!("cannot write {:?}: {}", manifest_path, e))?;

        let staged = self.layout.request_dir( req).join( format!("{FINAL_ARCHIVE}.partial"));
        zip_dir( &final_dir, &staged).map_err( |e| assembly_error!("cannot create {:?}: {}", staged, e))?;
        info!("assembled {} runs into {:?}", run_dirs.len(), staged);

        Ok(staged)
    }

    fn build_final_dir (&self, final_dir: &Path, run_dirs: &BTreeMap<RunKey,PathBuf>)->Result<()> {
        if final_dir.exists() { // left over from an incomplete previous attempt
            fs::remove_dir_all( final_dir)?;
        }

        for q in Quantity::ALL {
            fs::create_dir_all( final_dir.join( q.plots_dir_name()))?;
            fs::create_dir_all( final_dir.join( q.datas_dir_name()))?;
        }

        for (key, run_dir) in run_dirs {
            for path in files_in_tree( run_dir)? {
                if let Some(target) = self.target_path( final_dir, key, &path) {
                    fs::copy( &path, &target)?;
                    debug!("{:?} -> {:?}", path, target);
                }
            }
        }
        Ok(())
    }

    /// where a run product goes: `plots_<q>/` for png images, `datas_<q>/` for everything else.
    /// Files that do not belong to a quantity are skipped
    pub fn target_path (&self, final_dir: &Path, key: &RunKey, path: &Path)->Option<PathBuf> {
        let quantity = Quantity::of_file( path)?;
        let fname = path.file_name()?.to_str()?;

        let is_plot = path.extension()
            .and_then( |e| e.to_str())
            .map( |e| e.eq_ignore_ascii_case("png"))
            .unwrap_or(false);
        let sub_dir = if is_plot { quantity.plots_dir_name() } else { quantity.datas_dir_name() };

        Some( final_dir.join( sub_dir).join( self.product_name( key, fname)) )
    }

    /// replace the model prefix in a product filename with the run key
    pub fn product_name (&self, key: &RunKey, fname: &str)->String {
        let key = key.to_string();
        if !self.model_prefix.is_empty() && fname.contains( self.model_prefix.as_str()) {
            fname.replacen( self.model_prefix.as_str(), &key, 1)
        } else {
            format!("{key}_{fname}")
        }
    }
}

/// pack `dir` into a zip archive at `archive_path`, with entry names relative to the parent of `dir`
/// (i.e. starting with the name of `dir`). Entries are sorted and carry a fixed timestamp so that
/// the same input always produces the same bytes
pub fn zip_dir (dir: &Path, archive_path: &Path)->Result<()> {
    let base = dir.parent().ok_or( assembly_error!("no parent of {:?}", dir))?;
    let options = SimpleFileOptions::default()
        .compression_method( CompressionMethod::Deflated)
        .last_modified_time( zip::DateTime::default())
        .unix_permissions( 0o644);
    let dir_options = options.unix_permissions( 0o755); // directories have to be traversable once unpacked

    let mut entries = vec![ dir.to_path_buf() ];
    entries.extend( entries_in_tree( dir)?);

    let mut zip = ZipWriter::new( File::create( archive_path)?);
    for path in &entries {
        let name = entry_name( base, path)?;
        if path.is_dir() {
            zip.add_directory( format!("{name}/"), dir_options)?;
        } else {
            zip.start_file( name, options)?;
            let mut file = File::open( path)?;
            io::copy( &mut file, &mut zip)?;
        }
    }
    zip.finish()?;

    Ok(())
}

/// '/' separated path of `path` relative to `base`
fn entry_name (base: &Path, path: &Path)->Result<String> {
    let rel = path.strip_prefix( base).map_err( |_| assembly_error!("{:?} not within {:?}", path, base))?;
    let parts: Option<Vec<&str>> = rel.components().map( |c| c.as_os_str().to_str()).collect();
    parts.map( |p| p.join("/")).ok_or( assembly_error!("invalid entry name {:?}", rel))
}
