//! Run a single data binding.

use std::time::Instant;

use anyhow::{bail, Context as _, Result};
use clap::ValueEnum;
use voyage_cache::QueryResult;
use voyage_data::{ExperienceFilters, PackageFilters, PropertyFilters};
use voyage_sdk::TravelClient;

use super::{FetchArgs, Resource};
use crate::context::Context;
use crate::output::format_millis;

/// Run the fetch command.
pub async fn run(args: FetchArgs, ctx: &Context) -> Result<()> {
    let client = ctx.client(args.fixtures.as_deref())?;
    let name = resource_name(args.resource);

    let spinner = ctx.output.spinner(&format!("Fetching {}", name));
    let started = Instant::now();
    let result = fetch(&client, &args).await;
    spinner.finish_and_clear();
    let result = result?;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let view = result.view();
    let metrics = client.metrics().snapshot();
    if ctx.output.is_json() {
        if ctx.output.is_verbose() {
            ctx.output.json(&serde_json::json!({ "result": view, "metrics": metrics }));
        } else {
            ctx.output.json(&view);
        }
    } else {
        ctx.output.header(&name);
        ctx.output.kv("elapsed", &format_millis(elapsed_ms));
        if let Some(data) = &view.data {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
        if ctx.output.is_verbose() {
            ctx.output.info(&metrics.to_summary());
        }
    }

    if let Some(error) = view.error {
        bail!("{} failed: {}", name, error);
    }

    Ok(())
}

/// Run the binding `args` names.
pub async fn fetch(client: &TravelClient, args: &FetchArgs) -> Result<QueryResult> {
    let result = match args.resource {
        Resource::Properties => client.properties(&PropertyFilters::default()).await,
        Resource::FeaturedProperties => client.featured_properties().await,
        Resource::Property => client.property(require_id(args)?).await,
        Resource::PropertyReviews => client.property_reviews(require_id(args)?).await,
        Resource::Packages => client.packages(&PackageFilters::default()).await,
        Resource::FeaturedPackages => client.featured_packages().await,
        Resource::Package => client.package(require_id(args)?).await,
        Resource::Experiences => client.experiences(&ExperienceFilters::default()).await,
        Resource::Reviews => client.reviews(args.featured).await,
        Resource::PropertyTypes => client.property_types().await,
        Resource::Amenities => client.amenities().await,
        Resource::Locations => client.locations().await,
        Resource::Destinations => client.destinations(args.featured.then_some(true)).await,
        Resource::Homepage => client.homepage().await,
        Resource::Search => {
            let term = args.term.as_deref().context("search requires --term")?;
            client.global_search(term).await
        }
    };
    Ok(result)
}

fn require_id(args: &FetchArgs) -> Result<u64> {
    args.id
        .with_context(|| format!("{} requires --id", resource_name(args.resource)))
}

fn resource_name(resource: Resource) -> String {
    resource
        .to_possible_value()
        .map(|value| value.get_name().to_string())
        .unwrap_or_else(|| format!("{:?}", resource))
}
