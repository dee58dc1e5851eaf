//! docanchor - anchors, tables of contents and cross-document links

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = doc_anchors::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
