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

use chrono::{NaiveDate, TimeDelta};
use odin_dtm::{
    OdinDtmError,
    indices::{AP_TO_KP, FileIndexSource, IndexDataset, IndexSource, N_COLUMNS, nearest_kp}
};

fn ymd (y: i32, m: u32, d: u32)->NaiveDate { NaiveDate::from_ymd_opt(y,m,d).unwrap() }

/// a data line in GFZ format: `Year Month Day Days Days_M Bsr dB Kp1..Kp8 ap1..ap8 Ap SN F10.7obs F10.7adj D`
fn gfz_line (date: NaiveDate, kp: [f64;8], ap: i32, f107: f64)->String {
    use chrono::Datelike;
    let mut cols: Vec<String> = vec![
        date.year().to_string(), format!("{:02}", date.month()), format!("{:02}", date.day()),
        "12345".into(), "12345.5".into(), "2600".into(), "1".into()
    ];
    cols.extend( kp.iter().map( |k| format!("{k:.3}")));
    cols.extend( (0..8).map( |_| ap.to_string()));
    cols.push( ap.to_string());
    cols.push( "42".into());
    cols.push( format!("{f107:.1}"));
    cols.push( format!("{f107:.1}"));
    cols.push( "2".into());
    assert_eq!( cols.len(), N_COLUMNS);
    cols.join(" ")
}

fn header (n: usize)->String {
    (0..n).map( |i| format!("header line {i}: Kp, ap, Ap, SN and F10.7 since 1932\n")).collect()
}

#[test]
fn test_nearest_kp () {
    for (ap, kp) in AP_TO_KP {
        assert_eq!( nearest_kp( ap as f64), kp);
    }

    assert_eq!( nearest_kp(10.0), 2.33);  // 9 is closer than 12
    assert_eq!( nearest_kp(1.0), 0.0);    // 0 and 2 equidistant -> lower
    assert_eq!( nearest_kp(8.0), 2.0);    // 7 and 9 equidistant -> lower
    assert_eq!( nearest_kp(350.0), 8.66); // 300 and 400 equidistant -> lower
    assert_eq!( nearest_kp(1000.0), 9.0);
    assert_eq!( nearest_kp(-5.0), 0.0);
}

#[test]
fn test_parse_table () {
    let d0 = ymd(2024,1,1);
    let mut text = header(40);
    text.push_str("#YYY MM DD days days_m Bsr dB Kp1 ...\n\n");
    for i in 0..10 {
        let date = d0 + TimeDelta::days(i);
        let f107 = if i == 5 { -1.0 } else { 100.0 + i as f64 };
        text.push_str( &gfz_line( date, [i as f64 / 3.0; 8], 4 + i as i32, f107));
        text.push('\n');
    }

    let ds = IndexDataset::parse( &text, 40, ymd(2024,1,3), ymd(2024,1,8)).unwrap();
    assert_eq!( ds.len(), 6);
    assert_eq!( ds.records().first().unwrap().date, ymd(2024,1,3));
    assert_eq!( ds.records().last().unwrap().date, ymd(2024,1,8));

    let rec = ds.get( ymd(2024,1,4)).unwrap();
    assert_eq!( rec.ap, 7);
    assert_eq!( rec.f107_obs, Some(103.0));
    assert!( (rec.kp[7] - 1.0).abs() < 1e-3);

    // -1 is reported as missing and omitted from means
    assert_eq!( ds.get( ymd(2024,1,6)).unwrap().f107_obs, None);
    assert!( ds.flux( ymd(2024,1,6)).unwrap().is_nan());
    let mean = ds.mean_flux( ymd(2024,1,4), ymd(2024,1,7));
    assert!( (mean - (103.0 + 104.0 + 106.0) / 3.0).abs() < 1e-9);

    assert!( ds.mean_flux( ymd(2023,1,1), ymd(2023,1,31)).is_nan());
    assert_eq!( ds.nearest_index_map( ymd(2024,1,8)).unwrap(), nearest_kp(11.0));
}

#[test]
fn test_missing_record () {
    let d0 = ymd(2024,1,1);
    let text: String = [0,1,3].iter()
        .map( |i| gfz_line( d0 + TimeDelta::days(*i), [1.0;8], 5, 70.0) + "\n")
        .collect();

    let ds = IndexDataset::parse( &text, 0, d0, ymd(2024,1,4)).unwrap();
    assert!( ds.require( ymd(2024,1,2)).is_ok());
    match ds.require( ymd(2024,1,3)) {
        Err(OdinDtmError::MissingRecord(date)) => assert_eq!( date, ymd(2024,1,3)),
        other => panic!("expected MissingRecord, got {other:?}")
    }
}

#[test]
fn test_malformed_table () {
    let text = "2024 01 01 1 1 1 1 1.0 2.0\n";
    match IndexDataset::parse( text, 0, ymd(2024,1,1), ymd(2024,1,1)) {
        Err(OdinDtmError::FetchError(msg)) => println!("got expected error: {msg}"),
        other => panic!("expected FetchError, got {other:?}")
    }

    let bad_value = gfz_line( ymd(2024,1,1), [1.0;8], 5, 70.0).replacen("70.0", "n/a", 1);
    assert!( matches!( IndexDataset::parse( &bad_value, 0, ymd(2024,1,1), ymd(2024,1,1)), Err(OdinDtmError::FetchError(_))));
}

#[tokio::test]
async fn test_file_source () {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Kp_ap_Ap_SN_F107.txt");

    let d0 = ymd(2023,12,30);
    let mut text = header(3);
    for i in 0..5 {
        text.push_str( &gfz_line( d0 + TimeDelta::days(i), [2.0;8], 9, 150.0));
        text.push('\n');
    }
    std::fs::write( &path, text).unwrap();

    let source = FileIndexSource::new( &path, 3);
    let ds = source.load( ymd(2023,12,31), ymd(2024,1,2)).await.unwrap();
    assert_eq!( ds.len(), 3);
    assert_eq!( ds.nearest_index_map( ymd(2024,1,1)).unwrap(), 2.33);

    let missing = FileIndexSource::new( dir.path().join("nope.txt"), 3);
    assert!( matches!( missing.load( d0, d0).await, Err(OdinDtmError::FetchError(_))));
}
