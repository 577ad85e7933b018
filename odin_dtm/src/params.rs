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

//! derivation of DTM2020 run parameters from the index table

use chrono::{Datelike, NaiveDate, TimeDelta};
use serde::Serialize;
use tracing::{debug,info};

use crate::{
    RequestKey, RunKey, EPOCHS_PER_DAY, EPOCH_HOURS, FLUX_WINDOW_DAYS, MAX_HORIZON_DAYS, MIN_ALTITUDE, MAX_ALTITUDE,
    errors::{Result,input_error},
    indices::{IndexDataset,IndexSource}
};

/// the two flavors of the workflow
#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum WorkflowVariant {
    /// only compute the day templates for the request date and the following day
    Parameters,
    /// dispatch, collect and assemble all runs for the request date and `horizon_days` following days
    FullRun { horizon_days: u32 },
}

impl WorkflowVariant {
    pub fn horizon_days (&self)->u32 {
        match self {
            WorkflowVariant::Parameters => 1,
            WorkflowVariant::FullRun { horizon_days } => *horizon_days,
        }
    }

    /// how many days before today the latest admissible request date is. Full runs need the
    /// index records of all following days
    pub fn lag_days (&self)->i64 {
        match self {
            WorkflowVariant::Parameters => 1,
            WorkflowVariant::FullRun {..} => 3,
        }
    }
}

/// check a raw (date,altitude) request and turn it into a RequestKey
pub fn validate_request (date: &str, altitude: i64, variant: WorkflowVariant, today: NaiveDate)->Result<RequestKey> {
    let date = NaiveDate::parse_from_str( date, "%Y-%m-%d")
        .map_err( |_| input_error!("invalid date format '{}'. Ensure the format is YYYY-MM-DD", date))?;

    let first = NaiveDate::from_ymd_opt( 1970, 1, 1).ok_or( input_error!("invalid epoch"))?;
    let last = today - TimeDelta::days( variant.lag_days());
    if date < first || date > last {
        return Err( input_error!("date {} is outside of [{}, {}]", date, first, last))
    }

    if altitude < MIN_ALTITUDE as i64 || altitude > MAX_ALTITUDE as i64 {
        return Err( input_error!("altitude {} km is outside of [{}, {}]", altitude, MIN_ALTITUDE, MAX_ALTITUDE))
    }

    Ok( RequestKey::new( date, altitude as u32) )
}

pub fn check_horizon (horizon_days: u32)->Result<()> {
    if horizon_days > MAX_HORIZON_DAYS {
        Err( input_error!("horizon of {} days exceeds max of {}", horizon_days, MAX_HORIZON_DAYS))
    } else {
        Ok(())
    }
}

/// 1-based ordinal of `date` within its year
pub fn day_of_year (date: NaiveDate)->u32 {
    date.ordinal()
}

/// the inclusive date window of index records needed to derive parameters for `date` and
/// `horizon_days` following days
pub fn index_window (date: NaiveDate, horizon_days: u32)->(NaiveDate,NaiveDate) {
    (date - TimeDelta::days( FLUX_WINDOW_DAYS - 1), date + TimeDelta::days( horizon_days as i64))
}

/// parameters shared by all 8 epoch runs of one reference day
#[derive(Debug,Clone,PartialEq,Serialize)]
pub struct DayTemplate {
    #[serde(skip)]
    pub date: NaiveDate,

    /// day of year of the reference date
    pub day: u32,

    /// mean F10.7 over the 81 days ending at the reference date
    pub fm: f64,

    /// observed F10.7 at the reference date
    pub fl: f64,

    /// altitude in km
    pub alt: u32,

    /// Kp of the 3h interval preceding each epoch: `[Kp8(date-1), Kp1(date) .. Kp7(date)]`
    pub akp1: [f64;8],

    /// Kp equivalent of the daily Ap at the reference date
    pub akp3: f64,
}

impl DayTemplate {
    /// the 8 runs of this day in epoch order
    pub fn runs (&self)->impl Iterator<Item=RunParameters> + '_ {
        self.akp1.iter().enumerate().map( move |(i, akp1)| {
            let hour = i as u32 * EPOCH_HOURS;
            RunParameters {
                key: RunKey::new( self.day, hour),
                day: self.day,
                hour,
                fm: self.fm,
                fl: self.fl,
                alt: self.alt,
                akp1: *akp1,
                akp3: self.akp3,
            }
        })
    }
}

/// the input of a single remote model run (one 3h epoch)
#[derive(Debug,Clone,PartialEq,Serialize)]
pub struct RunParameters {
    pub key: RunKey,
    pub day: u32,
    pub hour: u32,
    pub fm: f64,
    pub fl: f64,
    pub alt: u32,
    pub akp1: f64,
    pub akp3: f64,
}

/// the result of the parameter-only workflow
#[derive(Debug,Clone,Serialize)]
pub struct ParameterSet {
    pub date: NaiveDate,
    pub altitude: u32,
    pub runs: Vec<DayTemplate>,
}

impl ParameterSet {
    /// all epoch runs, ordered by day and then by epoch
    pub fn expand_runs (&self)->Vec<RunParameters> {
        expand_runs( &self.runs)
    }
}

pub fn expand_runs (templates: &[DayTemplate])->Vec<RunParameters> {
    templates.iter().flat_map( |t| t.runs()).collect()
}

/// compute the day template for reference date `date + offset`
fn derive_day (ds: &IndexDataset, date: NaiveDate, altitude: u32, offset: u32)->Result<DayTemplate> {
    let offset = TimeDelta::days( offset as i64);
    let ref_date = date + offset;
    let prev_date = ref_date - TimeDelta::days(1);

    let window_start = date - TimeDelta::days( FLUX_WINDOW_DAYS - 1) + offset;
    let fm = ds.mean_flux( window_start, ref_date);

    let rec = ds.require( ref_date)?;
    let prev = ds.require( prev_date)?;

    let mut akp1 = [0.0; EPOCHS_PER_DAY];
    akp1[0] = prev.kp[7];
    akp1[1..].copy_from_slice( &rec.kp[..7]);

    let template = DayTemplate {
        date: ref_date,
        day: day_of_year( ref_date),
        fm,
        fl: ds.flux( ref_date)?,
        alt: altitude,
        akp1,
        akp3: ds.nearest_index_map( ref_date)?,
    };
    debug!("{}: day={} fm={:.2} fl={} akp3={} akp1={:?}", ref_date, template.day, template.fm, template.fl, template.akp3, template.akp1);

    Ok(template)
}

/// derive the `horizon_days + 1` day templates for a request from an already loaded dataset
pub fn derive (ds: &IndexDataset, req: &RequestKey, horizon_days: u32)->Result<Vec<DayTemplate>> {
    check_horizon( horizon_days)?;
    (0..=horizon_days).map( |k| derive_day( ds, req.date, req.altitude, k)).collect()
}

/// load the required index window (once) and derive all day templates for a request
pub async fn derive_parameters (source: &dyn IndexSource, req: &RequestKey, horizon_days: u32)->Result<ParameterSet> {
    check_horizon( horizon_days)?;

    let (start, end) = index_window( req.date, horizon_days);
    info!("deriving parameters for {} from index window [{}, {}]", req, start, end);

    let ds = source.load( start, end).await?;
    let runs = derive( &ds, req, horizon_days)?;

    Ok( ParameterSet { date: req.date, altitude: req.altitude, runs } )
}
