// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `hidring validate` command - Validate configuration file.

use hidring_core::ConfigLoader;

pub async fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            let geometry = config.ring.geometry;
            println!("✓ Configuration is valid");
            println!();
            println!("Ring Settings:");
            println!("  Name:             {}", config.ring.name);
            println!("  Capacity:         {} bytes", geometry.capacity());
            println!(
                "  Header Format:    {:?} ({} bytes)",
                geometry.header_format(),
                geometry.header_size()
            );
            println!("  Mapping Size:     {} bytes", geometry.shared_region_size());
            println!();
            println!("Reader Settings:");
            println!(
                "  Staleness Window: {}ms",
                config.reader.staleness_window.as_millis()
            );
            println!("  Max Payload:      {} bytes", config.reader.max_payload);
            println!("  Report Layout:    {}", config.reader.layout);
            println!(
                "  Poll Interval:    {}ms",
                config.reader.poll_interval.as_millis()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
