use anyhow::Result;
use cart_shared::config::ConfigResponse;
use cart_shared::platform::PlatformSchema;
use cart_shared::rom::RomSchema;
use cart_shared::stats::StatsResponse;

use crate::rest::RestClient;

pub async fn platforms() -> Result<()> {
    let mut client = RestClient::new()?;
    let platforms: Vec<PlatformSchema> = client.get("/platforms").await?;

    if platforms.is_empty() {
        println!("No platforms in the library yet");
        return Ok(());
    }
    for platform in platforms {
        println!(
            "{:<30} {:<15} {:>6} roms  [{}]",
            platform.name, platform.slug, platform.rom_count, platform.id
        );
    }
    Ok(())
}

pub async fn roms(platform_id: Option<&str>, search: Option<&str>) -> Result<()> {
    let mut client = RestClient::new()?;

    let mut query: Vec<(&str, &str)> = vec![("limit", "100")];
    if let Some(platform_id) = platform_id {
        query.push(("platform_id", platform_id));
    }
    if let Some(search) = search {
        query.push(("search_term", search));
    }

    let roms: Vec<RomSchema> = client.get_query("/roms", &query).await?;
    if roms.is_empty() {
        println!("No roms found");
        return Ok(());
    }
    for rom in roms {
        let name = rom.name.as_deref().unwrap_or(&rom.file_name_no_tags);
        println!(
            "{:<50} {:<15} {:>10}  [{}]",
            name,
            rom.platform_slug,
            human_size(rom.file_size_bytes),
            rom.id
        );
    }
    Ok(())
}

pub async fn stats() -> Result<()> {
    let mut client = RestClient::new()?;
    let stats: StatsResponse = client.get("/stats").await?;

    println!("Platforms:   {}", stats.platforms);
    println!("Roms:        {}", stats.roms);
    println!("Saves:       {}", stats.saves);
    println!("States:      {}", stats.states);
    println!("Screenshots: {}", stats.screenshots);
    println!("Total size:  {}", human_size(stats.filesize));
    Ok(())
}

pub async fn config() -> Result<()> {
    let mut client = RestClient::new()?;
    let config: ConfigResponse = client.get("/config").await?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_size_picks_sensible_units() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KiB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MiB");
        assert_eq!(human_size(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }
}
