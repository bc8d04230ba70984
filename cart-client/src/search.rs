use anyhow::Result;
use cart_shared::search::SearchRomSchema;

use crate::rest::RestClient;

/// `cart search`: queries one metadata source for manual matching.
pub async fn search(rom_id: &str, source: &str, term: Option<&str>, by: &str) -> Result<()> {
    let mut client = RestClient::new()?;

    let mut query = vec![("rom_id", rom_id), ("source", source), ("search_by", by)];
    if let Some(term) = term {
        query.push(("search_term", term));
    }

    let results: Vec<SearchRomSchema> = client.get_query("/search/roms", &query).await?;
    if results.is_empty() {
        println!("No matches");
        return Ok(());
    }
    for result in results {
        let id = result
            .igdb_id
            .or(result.moby_id)
            .map(|id| id.to_string())
            .unwrap_or_default();
        println!("{:<50} [{} {}]", result.name, source, id);
        if !result.summary.is_empty() {
            let summary: String = result.summary.chars().take(120).collect();
            println!("    {}", summary);
        }
    }
    Ok(())
}
