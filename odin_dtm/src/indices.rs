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

//! geomagnetic activity and solar flux indices as published by GFZ Potsdam
//! (see <https://kp.gfz-potsdam.de/en/data>)

use std::{path::{Path,PathBuf}, time::Duration};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client,StatusCode};
use serde::Serialize;
use tracing::{debug,info};

use crate::{DtmConfig, errors::{OdinDtmError,Result,fetch_error}};

/// number of value columns in a data line of the GFZ table:
/// `Year Month Day Days Days_M Bsr dB Kp1..Kp8 ap1..ap8 Ap SN F10.7obs F10.7adj D`
pub const N_COLUMNS: usize = 28;

const COL_YEAR: usize = 0;
const COL_MONTH: usize = 1;
const COL_DAY: usize = 2;
const COL_KP1: usize = 7;
const COL_AP: usize = 23;
const COL_F107_OBS: usize = 25;

/// the Ap -> Kp equivalent table used by DTM2020 (ascending Ap keys)
pub const AP_TO_KP: [(u32,f64);28] = [
    (0, 0.0), (2, 0.33), (3, 0.66), (4, 1.0), (5, 1.33), (6, 1.66), (7, 2.0),
    (9, 2.33), (12, 2.66), (15, 3.0), (18, 3.33), (22, 3.66), (27, 4.0), (32, 4.33),
    (39, 4.66), (48, 5.0), (56, 5.33), (67, 5.66), (80, 6.0), (94, 6.33), (111, 6.66),
    (132, 7.0), (154, 7.33), (179, 7.66), (207, 8.0), (236, 8.33), (300, 8.66), (400, 9.0),
];

/// map an observed Ap value to the Kp equivalent of the nearest table key.
/// Equidistant values resolve to the lower key
pub fn nearest_kp (ap: f64)->f64 {
    let mut best = AP_TO_KP[0];
    for entry in &AP_TO_KP[1..] {
        if (entry.0 as f64 - ap).abs() < (best.0 as f64 - ap).abs() {
            best = *entry;
        }
    }
    best.1
}

/// one calendar day of index observations
#[derive(Debug,Clone,PartialEq,Serialize)]
pub struct IndexRecord {
    pub date: NaiveDate,

    /// the 3h Kp sub-indices (00-03h .. 21-24h)
    pub kp: [f64;8],

    /// daily equivalent amplitude
    pub ap: i32,

    /// observed F10.7 flux, None if the table reports it as missing
    pub f107_obs: Option<f64>,
}

impl IndexRecord {
    /// parse a whitespace delimited data line. Returns Ok(None) if the line is well formed but
    /// outside of [start,end]
    fn parse_in_window (line: &str, line_no: usize, start: NaiveDate, end: NaiveDate)->Result<Option<IndexRecord>> {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < N_COLUMNS {
            return Err( fetch_error!("line {}: expected {} columns, got {}", line_no, N_COLUMNS, cols.len()))
        }

        let year: i32 = parse_col( &cols, COL_YEAR, line_no)?;
        let month: u32 = parse_col( &cols, COL_MONTH, line_no)?;
        let day: u32 = parse_col( &cols, COL_DAY, line_no)?;
        let date = NaiveDate::from_ymd_opt( year, month, day)
            .ok_or( fetch_error!("line {}: invalid date {}-{}-{}", line_no, year, month, day))?;

        if date < start || date > end {
            return Ok(None)
        }

        let mut kp = [0.0;8];
        for (i, v) in kp.iter_mut().enumerate() {
            *v = parse_col( &cols, COL_KP1 + i, line_no)?;
        }

        let ap: i32 = parse_col( &cols, COL_AP, line_no)?;
        let f107: f64 = parse_col( &cols, COL_F107_OBS, line_no)?;
        let f107_obs = if f107 < 0.0 || f107.is_nan() { None } else { Some(f107) }; // GFZ uses -1 for missing values

        Ok( Some( IndexRecord { date, kp, ap, f107_obs }))
    }
}

fn parse_col<T: std::str::FromStr> (cols: &[&str], idx: usize, line_no: usize)->Result<T> {
    cols[idx].parse::<T>().map_err( |_| fetch_error!("line {}: invalid value '{}' in column {}", line_no, cols[idx], idx+1))
}

/// the index records for a bounded date window, ordered by date
#[derive(Debug,Clone)]
pub struct IndexDataset {
    pub start: NaiveDate,
    pub end: NaiveDate,
    records: Vec<IndexRecord>,
}

impl IndexDataset {
    /// create from records, dropping everything outside of [start,end]
    pub fn from_records (start: NaiveDate, end: NaiveDate, records: impl IntoIterator<Item=IndexRecord>)->Self {
        let mut records: Vec<IndexRecord> = records.into_iter().filter( |r| r.date >= start && r.date <= end).collect();
        records.sort_by_key( |r| r.date);
        records.dedup_by_key( |r| r.date);
        IndexDataset { start, end, records }
    }

    /// parse the GFZ text table, skipping `header_lines` and any further comment lines
    pub fn parse (text: &str, header_lines: usize, start: NaiveDate, end: NaiveDate)->Result<Self> {
        let mut records = Vec::new();

        for (i, line) in text.lines().enumerate().skip( header_lines) {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') { continue }

            if let Some(rec) = IndexRecord::parse_in_window( line, i+1, start, end)? {
                records.push( rec);
            }
        }

        Ok( Self::from_records( start, end, records) )
    }

    pub fn records (&self)->&[IndexRecord] { &self.records }

    pub fn len (&self)->usize { self.records.len() }

    pub fn is_empty (&self)->bool { self.records.is_empty() }

    pub fn get (&self, date: NaiveDate)->Option<&IndexRecord> {
        self.records.binary_search_by_key( &date, |r| r.date).ok().map( |i| &self.records[i])
    }

    /// a record we cannot do without - a gap in the table is a hard failure
    pub fn require (&self, date: NaiveDate)->Result<&IndexRecord> {
        self.get( date).ok_or( OdinDtmError::MissingRecord(date))
    }

    /// arithmetic mean of observed F10.7 over [from,to]. Missing observations are omitted,
    /// the result is NaN if there are none
    pub fn mean_flux (&self, from: NaiveDate, to: NaiveDate)->f64 {
        let (sum, n) = self.records.iter()
            .filter( |r| r.date >= from && r.date <= to)
            .filter_map( |r| r.f107_obs)
            .fold( (0.0, 0usize), |(sum,n), f| (sum + f, n + 1));

        if n > 0 { sum / n as f64 } else { f64::NAN }
    }

    /// observed flux at `date` (NaN if the observation is missing)
    pub fn flux (&self, date: NaiveDate)->Result<f64> {
        Ok( self.require( date)?.f107_obs.unwrap_or( f64::NAN) )
    }

    /// Kp equivalent of the Ap observed at `date`
    pub fn nearest_index_map (&self, date: NaiveDate)->Result<f64> {
        Ok( nearest_kp( self.require( date)?.ap as f64) )
    }
}

/* #region sources **************************************************************************************/

/// where we get the raw index table from. This is fetched once per workflow invocation
#[async_trait]
pub trait IndexSource: Send + Sync {
    async fn load (&self, start: NaiveDate, end: NaiveDate)->Result<IndexDataset>;
}

/// retrieves the table over http (normally from GFZ Potsdam)
pub struct GfzIndexSource {
    client: Client,
    url: String,
    header_lines: usize,
}

impl GfzIndexSource {
    pub fn new (url: impl ToString, header_lines: usize, timeout: Duration)->Result<Self> {
        let client = Client::builder().timeout( timeout).build()?;
        Ok( GfzIndexSource { client, url: url.to_string(), header_lines } )
    }

    pub fn from_config (config: &DtmConfig)->Result<Self> {
        Self::new( &config.index_url, config.index_header_lines, config.request_timeout)
    }

    async fn fetch_text (&self)->Result<String> {
        let response = self.client.get( &self.url).send().await
            .map_err( |e| fetch_error!("cannot reach {}: {}", self.url, e))?;

        match response.status() {
            StatusCode::OK => {
                response.text().await.map_err( |e| fetch_error!("reading {} failed: {}", self.url, e))
            }
            other => Err( fetch_error!("{} returned status {}", self.url, other))
        }
    }
}

#[async_trait]
impl IndexSource for GfzIndexSource {
    async fn load (&self, start: NaiveDate, end: NaiveDate)->Result<IndexDataset> {
        info!("fetching index table from {}", self.url);
        let text = self.fetch_text().await?;
        let ds = IndexDataset::parse( &text, self.header_lines, start, end)?;
        debug!("{} index records in [{}, {}]", ds.len(), start, end);
        Ok(ds)
    }
}

/// reads a local copy of the table (e.g. a mirrored file)
pub struct FileIndexSource {
    path: PathBuf,
    header_lines: usize,
}

impl FileIndexSource {
    pub fn new (path: impl AsRef<Path>, header_lines: usize)->Self {
        FileIndexSource { path: path.as_ref().to_path_buf(), header_lines }
    }
}

#[async_trait]
impl IndexSource for FileIndexSource {
    async fn load (&self, start: NaiveDate, end: NaiveDate)->Result<IndexDataset> {
        info!("reading index table from {:?}", self.path);
        let text = tokio::fs::read_to_string( &self.path).await
            .map_err( |e| fetch_error!("cannot read {:?}: {}", self.path, e))?;
        IndexDataset::parse( &text, self.header_lines, start, end)
    }
}

/// the configured source: a local file if `index_file` is set, `index_url` otherwise
pub fn index_source_from_config (config: &DtmConfig)->Result<Box<dyn IndexSource>> {
    if let Some(path) = &config.index_file {
        Ok( Box::new( FileIndexSource::new( path, config.index_header_lines)) )
    } else {
        Ok( Box::new( GfzIndexSource::from_config( config)?) )
    }
}

/* #endregion sources */
