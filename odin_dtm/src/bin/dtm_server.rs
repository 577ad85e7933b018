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

use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use odin_dtm::{DtmConfig, load_config, service::router, workflow::DtmWorkflow};

#[derive(Parser, Debug)]
#[command(version, about, long_about = "serve the DTM2020 workflow over http")]
pub struct Args {
    /// the RON config file
    #[arg(short,long, default_value = "configs/dtm.ron")]
    pub config: PathBuf,

    /// address to listen on
    #[arg(short,long, default_value = "127.0.0.1:8000")]
    pub addr: SocketAddr,
}

#[tokio::main]
async fn main()->Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter( EnvFilter::try_from_default_env().unwrap_or_else( |_| EnvFilter::new("info"))) // use RUST_LOG to set max level
        .init();

    let args = Args::parse();

    let config: DtmConfig = load_config( &args.config)?;
    info!("using config {:?}: {:?}", args.config, config);

    let workflow = Arc::new( DtmWorkflow::from_config( config)?);
    let listener = TcpListener::bind( args.addr).await?;
    info!("serving on http://{}", args.addr);

    axum::serve( listener, router( workflow)).await?;
    Ok(())
}
