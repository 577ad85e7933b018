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

use std::sync::Mutex;
use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta, Utc};
use odin_dtm::{
    OdinDtmError, RequestKey, RunKey, Result,
    indices::{IndexDataset, IndexRecord, IndexSource, nearest_kp},
    params::{WorkflowVariant, day_of_year, derive, derive_parameters, index_window, validate_request}
};

fn ymd (y: i32, m: u32, d: u32)->NaiveDate { NaiveDate::from_ymd_opt(y,m,d).unwrap() }

/// 90 days starting 2024-01-01: F10.7 = 100 + day, Ap = day, Kp[j] = j + day/100
fn synthetic_records ()->Vec<IndexRecord> {
    (1..=90).map( |n: i64| {
        let mut kp = [0.0;8];
        for (j, k) in kp.iter_mut().enumerate() { *k = j as f64 + n as f64 / 100.0 }
        IndexRecord { date: ymd(2024,1,1) + TimeDelta::days(n-1), kp, ap: n as i32, f107_obs: Some(100.0 + n as f64) }
    }).collect()
}

fn dataset (records: Vec<IndexRecord>)->IndexDataset {
    IndexDataset::from_records( ymd(2024,1,1), ymd(2024,3,30), records)
}

/// remembers the requested window
struct RecordingSource {
    records: Vec<IndexRecord>,
    window: Mutex<Option<(NaiveDate,NaiveDate)>>,
}

#[async_trait]
impl IndexSource for RecordingSource {
    async fn load (&self, start: NaiveDate, end: NaiveDate)->Result<IndexDataset> {
        *self.window.lock().unwrap() = Some((start,end));
        Ok( IndexDataset::from_records( start, end, self.records.clone()) )
    }
}

fn approx_eq (a: f64, b: f64)->bool { (a - b).abs() < 1e-9 }

#[test]
fn test_day_of_year () {
    assert_eq!( day_of_year( ymd(2024,1,1)), 1);
    assert_eq!( day_of_year( ymd(2024,3,1)), 61);
    assert_eq!( day_of_year( ymd(2024,12,31)), 366);
    assert_eq!( day_of_year( ymd(2023,12,31)), 365);
}

#[test]
fn test_validate_request () {
    let today = ymd(2025,6,15);
    let params = WorkflowVariant::Parameters;
    let full = WorkflowVariant::FullRun { horizon_days: 2 };

    let req = validate_request( "2024-03-21", 400, params, today).unwrap();
    assert_eq!( req, RequestKey::new( ymd(2024,3,21), 400));

    for (date, alt) in [("2024-13-01", 120), ("21-03-2024", 120), ("", 120), ("2024-03-21", 1501), ("2024-03-21", 119),
                        ("2025-06-16", 120), ("2025-06-15", 120), ("1969-12-31", 120)] {
        let res = validate_request( date, alt, params, today);
        assert!( matches!( res, Err(OdinDtmError::InputValidation(_))), "accepted {date} / {alt}");
        assert!( res.unwrap_err().is_client_error());
    }

    // bounds are inclusive
    assert!( validate_request( "1970-01-01", 120, params, today).is_ok());
    assert!( validate_request( "2024-03-21", 120, params, today).is_ok());
    assert!( validate_request( "2024-03-21", 1500, params, today).is_ok());
    assert!( validate_request( "2025-06-14", 120, params, today).is_ok());

    // full runs need records of the following days
    assert!( validate_request( "2025-06-14", 120, full, today).is_err());
    assert!( validate_request( "2025-06-12", 120, full, today).is_ok());
}

#[test]
fn test_derive_days () {
    let ds = dataset( synthetic_records());
    let req = RequestKey::new( ymd(2024,3,21), 300);
    let days = derive( &ds, &req, 1).unwrap();
    assert_eq!( days.len(), 2);

    let d = &days[0];
    println!("{d:?}");
    assert_eq!( d.day, 81);
    assert_eq!( d.alt, 300);
    assert!( approx_eq( d.fm, 141.0)); // mean of 101..=181
    assert!( approx_eq( d.fl, 181.0));
    assert_eq!( d.akp3, nearest_kp(81.0));
    assert_eq!( d.akp1.len(), 8);
    assert!( approx_eq( d.akp1[0], 7.0 + 0.80)); // Kp8 of the previous day
    for j in 1..8 {
        assert!( approx_eq( d.akp1[j], (j-1) as f64 + 0.81));
    }

    let d = &days[1];
    assert_eq!( d.day, 82);
    assert!( approx_eq( d.fm, 142.0));
    assert!( approx_eq( d.fl, 182.0));
    assert!( approx_eq( d.akp1[0], 7.81));
}

#[test]
fn test_derive_missing_values () {
    let mut records = synthetic_records();

    // a missing flux inside the averaging window is omitted
    records[9].f107_obs = None;
    let ds = dataset( records.clone());
    let days = derive( &ds, &RequestKey::new( ymd(2024,3,21), 120), 0).unwrap();
    assert!( approx_eq( days[0].fm, (81.0 * 141.0 - 110.0) / 80.0));

    // the previous day has to be there
    records.retain( |r| r.date != ymd(2024,3,20));
    let ds = dataset( records);
    match derive( &ds, &RequestKey::new( ymd(2024,3,21), 120), 0) {
        Err(OdinDtmError::MissingRecord(date)) => assert_eq!( date, ymd(2024,3,20)),
        other => panic!("expected MissingRecord, got {other:?}")
    }

    assert!( derive( &dataset( synthetic_records()), &RequestKey::new( ymd(2024,3,21), 120), 3).is_err());
}

#[tokio::test]
async fn test_derive_parameters () {
    let source = RecordingSource { records: synthetic_records(), window: Mutex::new(None) };
    let req = RequestKey::new( ymd(2024,3,21), 500);

    let params = derive_parameters( &source, &req, 1).await.unwrap();
    assert_eq!( *source.window.lock().unwrap(), Some( (ymd(2024,1,1), ymd(2024,3,22))));
    assert_eq!( index_window( req.date, 1), (ymd(2024,1,1), ymd(2024,3,22)));

    let runs = params.expand_runs();
    assert_eq!( runs.len(), 16);
    let keys: Vec<String> = runs.iter().map( |r| r.key.to_string()).collect();
    assert_eq!( keys[0], "81_0");
    assert_eq!( keys[7], "81_21");
    assert_eq!( keys[8], "82_0");
    assert_eq!( runs[15].key, RunKey::new(82,21));
    for (i, run) in runs[..8].iter().enumerate() {
        assert_eq!( run.hour, i as u32 * 3);
        assert_eq!( run.akp1, params.runs[0].akp1[i]);
        assert_eq!( run.fm, params.runs[0].fm);
        assert_eq!( run.alt, 500);
    }

    let json: serde_json::Value = serde_json::to_value( &params).unwrap();
    assert_eq!( json["date"], "2024-03-21");
    assert_eq!( json["altitude"], 500);
    let run = &json["runs"][0];
    assert_eq!( run["day"], 81);
    assert_eq!( run["akp1"].as_array().unwrap().len(), 8);
    assert!( run.get("date").is_none());
}

#[tokio::test]
async fn test_missing_flux_serializes_as_null () {
    let mut records = synthetic_records();
    records[80].f107_obs = None; // 2024-03-21
    let source = RecordingSource { records, window: Mutex::new(None) };

    let params = derive_parameters( &source, &RequestKey::new( ymd(2024,3,21), 120), 1).await.unwrap();
    assert!( params.runs[0].fl.is_nan());

    let json = serde_json::to_value( &params).unwrap();
    assert!( json["runs"][0]["fl"].is_null());
    assert!( json["runs"][1]["fl"].is_number());
}

#[test]
fn test_today_is_rejected () {
    let today = Utc::now().date_naive();
    let date = today.format("%Y-%m-%d").to_string();
    assert!( validate_request( &date, 120, WorkflowVariant::Parameters, today).is_err());
}
