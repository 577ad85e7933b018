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

//! odin_dtm computes the driver parameters for the DTM2020 thermosphere model from the GFZ
//! Kp/Ap/F10.7 table, fans out one remote model run per 3h epoch, collects the result archives
//! and re-packs them into one archive grouped by physical quantity.
//!
//! The pipeline is `WorkflowCache -> indices/params -> dispatch -> collect -> assemble -> WorkflowCache`,
//! driven by [`workflow::DtmWorkflow`]. Remote collaborators are abstracted as [`indices::IndexSource`]
//! and [`model_service::ModelService`].

use std::{fmt, path::{Path,PathBuf}, time::Duration};
use serde::{Serialize,Serializer,Deserialize};
use chrono::NaiveDate;

pub mod errors;
pub use errors::{OdinDtmError,Result};
use errors::op_failed;

pub mod indices;
pub mod params;
pub mod model_service;
pub mod dispatch;
pub mod collect;
pub mod assemble;
pub mod cache;
pub mod workflow;
pub mod service;

pub const MIN_ALTITUDE: u32 = 120; // km
pub const MAX_ALTITUDE: u32 = 1500; // km

pub const EPOCHS_PER_DAY: usize = 8;
pub const EPOCH_HOURS: u32 = 3;

/// number of days (including the reference date) over which we average F10.7
pub const FLUX_WINDOW_DAYS: i64 = 81;

/// max number of days following the request date that can be included in a workflow
pub const MAX_HORIZON_DAYS: u32 = 2;

pub const DEFAULT_INDEX_URL: &str = "https://kp.gfz-potsdam.de/app/files/Kp_ap_Ap_SN_F107_since_1932.txt";
pub const DEFAULT_MODEL_PREFIX: &str = "DTM20F107Kp";

pub const FINAL_DIR: &str = "final";
pub const FINAL_ARCHIVE: &str = "final_output.zip";
pub const MANIFEST_FILE: &str = "inputs_runs.json";

/// general configuration of the DTM workflow, normally loaded from `configs/dtm.ron`
#[derive(Clone,Serialize,Deserialize,Debug)]
#[serde(default)]
pub struct DtmConfig {
    /// root of the persisted output tree (`{root_dir}/output/{date}/{altitude}/..`)
    pub root_dir: PathBuf,

    pub index_url: String,

    /// optional local copy of the index table, takes precedence over `index_url`
    pub index_file: Option<PathBuf>,

    pub index_header_lines: usize,

    /// base URL of the model service (`{model_url}/execute`, `{model_url}/results`)
    pub model_url: String,

    /// name of the JSON field in the execute response that holds the execution id
    pub execution_id_field: String,

    /// number of days following the request date for full workflow runs
    pub horizon_days: u32,

    /// max number of simultaneous remote calls
    pub max_concurrent: usize,

    pub request_timeout: Duration,

    pub poll_interval: Duration,

    /// max time to wait for a single run to complete
    pub max_wait: Duration,

    /// filename prefix of model products that gets replaced by run keys
    pub model_prefix: String,
}

impl Default for DtmConfig {
    fn default()->Self {
        DtmConfig {
            root_dir: PathBuf::from("."),
            index_url: DEFAULT_INDEX_URL.to_string(),
            index_file: None,
            index_header_lines: 40,
            model_url: "http://localhost:8080/dtm2020".to_string(),
            execution_id_field: "execution_id".to_string(),
            horizon_days: 2,
            max_concurrent: 8,
            request_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(600),
            model_prefix: DEFAULT_MODEL_PREFIX.to_string(),
        }
    }
}

pub fn load_config<C,P> (path: P)->Result<C> where C: for <'a> Deserialize<'a>, P: AsRef<Path> {
    let data = std::fs::read( path.as_ref())?;
    Ok( ron::de::from_bytes( data.as_slice())? )
}

/* #region keys *****************************************************************************************/

/// identity of a workflow result: (date, altitude)
#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash,PartialOrd,Ord)]
pub struct RequestKey {
    pub date: NaiveDate,
    pub altitude: u32, // km
}

impl RequestKey {
    pub fn new (date: NaiveDate, altitude: u32)->Self {
        RequestKey { date, altitude }
    }

    pub fn date_str (&self)->String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}km", self.date.format("%Y-%m-%d"), self.altitude)
    }
}

/// identity of a single model run within a workflow, rendered as `{day_of_year}_{hour}`
#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash,PartialOrd,Ord)]
pub struct RunKey {
    pub day: u32,
    pub hour: u32,
}

impl RunKey {
    pub fn new (day: u32, hour: u32)->Self { RunKey { day, hour } }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.day, self.hour)
    }
}

impl Serialize for RunKey {
    fn serialize<S: Serializer> (&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/* #endregion keys */

/* #region quantities ***********************************************************************************/

/// the physical quantities produced by each DTM2020 run
#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash)]
pub enum Quantity { He, N2, O, Ro, Tinf, Tz }

impl Quantity {
    pub const ALL: [Quantity;6] = [Quantity::He, Quantity::N2, Quantity::O, Quantity::Ro, Quantity::Tinf, Quantity::Tz];

    /// the tag used in model product filenames and output dir names
    pub fn tag (&self)->&'static str {
        match self {
            Quantity::He => "He",
            Quantity::N2 => "N2",
            Quantity::O => "O",
            Quantity::Ro => "ro",
            Quantity::Tinf => "Tinf",
            Quantity::Tz => "Tz",
        }
    }

    pub fn plots_dir_name (&self)->String { format!("plots_{}", self.tag()) }

    pub fn datas_dir_name (&self)->String { format!("datas_{}", self.tag()) }

    /// the quantity of a model product file, which is the last '_' separated element of the
    /// file stem (e.g. `DTM20F107Kp_ro.png` -> `Ro`)
    pub fn of_file (path: impl AsRef<Path>)->Option<Quantity> {
        let stem = path.as_ref().file_stem()?.to_str()?;
        let tag = stem.rsplit('_').next()?;
        Quantity::ALL.into_iter().find( |q| q.tag() == tag)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/* #endregion quantities */

/* #region output layout ********************************************************************************/

/// the on-disk layout for workflow artifacts:
/// ```text
/// {root}/output/{date}/{altitude}/{key}.zip
/// {root}/output/{date}/{altitude}/{key}/
/// {root}/output/{date}/{altitude}/final/{plots,datas}_{quantity}/
/// {root}/output/{date}/{altitude}/final/inputs_runs.json
/// {root}/output/{date}/{altitude}/final_output.zip
/// ```
#[derive(Debug,Clone)]
pub struct OutputLayout {
    root: PathBuf
}

impl OutputLayout {
    pub fn new (root: impl AsRef<Path>)->Self {
        OutputLayout { root: root.as_ref().to_path_buf() }
    }

    pub fn root (&self)->&Path { &self.root }

    pub fn request_dir (&self, req: &RequestKey)->PathBuf {
        self.root.join("output").join( req.date_str()).join( req.altitude.to_string())
    }

    pub fn run_archive (&self, req: &RequestKey, run: &RunKey)->PathBuf {
        self.request_dir(req).join( format!("{run}.zip"))
    }

    pub fn run_dir (&self, req: &RequestKey, run: &RunKey)->PathBuf {
        self.request_dir(req).join( run.to_string())
    }

    pub fn final_dir (&self, req: &RequestKey)->PathBuf {
        self.request_dir(req).join( FINAL_DIR)
    }

    pub fn manifest (&self, req: &RequestKey)->PathBuf {
        self.final_dir(req).join( MANIFEST_FILE)
    }

    pub fn final_archive (&self, req: &RequestKey)->PathBuf {
        self.request_dir(req).join( FINAL_ARCHIVE)
    }
}

/* #endregion output layout */

/// all regular files below `dir` (recursively), in lexicographic order
pub fn files_in_tree (dir: impl AsRef<Path>)->Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = entries_in_tree(dir)?.into_iter().filter( |p| p.is_file()).collect();
    files.sort();
    Ok(files)
}

/// all files and directories below `dir` (recursively, not including `dir` itself), in lexicographic order
pub fn entries_in_tree (dir: impl AsRef<Path>)->Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let dir_str = dir.to_str().ok_or( op_failed!("invalid dir name {:?}", dir))?;
    let pattern = format!("{}/**/*", glob::Pattern::escape(dir_str));

    let mut entries = Vec::new();
    for entry in glob::glob( &pattern).map_err( |e| op_failed!("invalid glob pattern {}: {}", pattern, e))? {
        entries.push( entry.map_err( |e| op_failed!("cannot read {:?}: {}", e.path(), e))? );
    }
    entries.sort();
    Ok(entries)
}
