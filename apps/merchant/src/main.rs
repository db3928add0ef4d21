use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    CacheRevalidator, FormEvent, FormServices, FormSnapshot, HttpProductsApi, HttpRevalidator,
    NoopRevalidator, PageLifecycle, ProductCreateController, ProductsApi, SubmitOutcome,
};
use shared::{
    domain::{BenefitId, FormType, OrganizationId, ProductId, RecurringInterval},
    protocol::ProductPriceCreate,
};
use storage::{DraftStore, Storage};
use tracing::{error, info};

mod config;

use config::{load_settings, normalize_database_url, Settings};

const DRAFT_SAVE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "merchant", about = "Create products and manage form drafts")]
struct Cli {
    #[arg(long, default_value = "merchant.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the benefits an organization can attach to products.
    Benefits {
        #[arg(long)]
        organization_id: OrganizationId,
    },
    /// Create a product, resuming from the stored draft.
    CreateProduct(CreateProductArgs),
    Draft {
        #[command(subcommand)]
        action: DraftAction,
    },
}

#[derive(clap::Args, Debug)]
struct CreateProductArgs {
    #[arg(long)]
    organization_id: OrganizationId,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    description: Option<String>,
    /// Amount in cents.
    #[arg(long)]
    price_amount: Option<i64>,
    #[arg(long, value_enum)]
    recurring: Option<IntervalArg>,
    #[arg(long = "benefit")]
    benefits: Vec<BenefitId>,
    /// Attach the selected benefits to a product an earlier run created
    /// without them, instead of creating a new product.
    #[arg(long, value_name = "PRODUCT_ID")]
    retry_attach: Option<ProductId>,
}

#[derive(Subcommand, Debug)]
enum DraftAction {
    /// Print the stored product form draft.
    Show,
    Clear,
    List,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum IntervalArg {
    Month,
    Year,
}

impl From<IntervalArg> for RecurringInterval {
    fn from(value: IntervalArg) -> Self {
        match value {
            IntervalArg::Month => RecurringInterval::Month,
            IntervalArg::Year => RecurringInterval::Year,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli.config);
    let storage = open_storage(&settings).await?;

    match cli.command {
        Command::Benefits { organization_id } => {
            let api = products_api(&settings)?;
            let benefits = api.list_benefits(organization_id).await?;
            for benefit in benefits {
                let selectable = if benefit.selectable { "" } else { " (not selectable)" };
                println!(
                    "{}  {:?}  {}{selectable}",
                    benefit.id, benefit.benefit_type, benefit.description
                );
            }
        }
        Command::CreateProduct(args) => create_product(&settings, storage, args).await?,
        Command::Draft { action } => match action {
            DraftAction::Show => match storage.read_draft(FormType::ProductCreate).await? {
                Some(values) => println!("{}", serde_json::to_string_pretty(&values)?),
                None => println!("no draft stored"),
            },
            DraftAction::Clear => {
                storage.clear_draft(FormType::ProductCreate).await?;
                println!("draft cleared");
            }
            DraftAction::List => {
                for draft in storage.list_drafts().await? {
                    println!("{}  saved {}", draft.form_type, draft.updated_at);
                }
            }
        },
    }

    Ok(())
}

async fn open_storage(settings: &Settings) -> Result<Storage> {
    let database_url = normalize_database_url(&settings.database_url);
    Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open draft database; verify parent directory exists and permissions are correct"
        );
        error
    })
}

fn products_api(settings: &Settings) -> Result<HttpProductsApi> {
    let api = HttpProductsApi::new(&settings.api_url()?);
    Ok(match &settings.access_token {
        Some(token) => api.with_access_token(token),
        None => api,
    })
}

async fn create_product(settings: &Settings, storage: Storage, args: CreateProductArgs) -> Result<()> {
    let revalidator: Arc<dyn CacheRevalidator> = match &settings.revalidate_url {
        Some(endpoint) => Arc::new(HttpRevalidator::new(endpoint)),
        None => Arc::new(NoopRevalidator),
    };
    let lifecycle = PageLifecycle::new();
    let services = FormServices {
        drafts: Arc::new(storage),
        products: Arc::new(products_api(settings)?),
        revalidator,
        lifecycle: lifecycle.clone(),
    };

    let controller = ProductCreateController::open(services, args.organization_id).await;
    controller
        .update(|values| {
            if let Some(name) = args.name {
                values.name = name;
            }
            if args.description.is_some() {
                values.description = args.description;
            }
            if args.price_amount.is_some() || args.recurring.is_some() {
                let amount = args
                    .price_amount
                    .or_else(|| values.prices.first().and_then(|p| p.price_amount));
                values.prices = vec![match args.recurring {
                    Some(interval) => ProductPriceCreate::recurring(amount, interval.into()),
                    None => ProductPriceCreate::one_time(amount),
                }];
            }
        })
        .await?;
    for benefit_id in args.benefits {
        controller.select_benefit(benefit_id).await?;
    }
    if let Some(product_id) = args.retry_attach {
        controller.resume_orphaned_product(product_id).await?;
    }

    let outcome = tokio::select! {
        outcome = async {
            if args.retry_attach.is_some() {
                controller.retry_attach_benefits().await
            } else {
                controller.submit().await
            }
        } => outcome,
        _ = tokio::signal::ctrl_c() => {
            keep_as_draft(&controller, &lifecycle).await;
            bail!("interrupted; form values kept as draft");
        }
    };

    match outcome {
        SubmitOutcome::Created(product) => {
            info!(product_id = %product.id, "merchant: product created");
            println!("created product {} ({})", product.name, product.id);
            Ok(())
        }
        SubmitOutcome::InvalidInput | SubmitOutcome::ValidationFailed => {
            print_field_errors(&controller.snapshot().await);
            keep_as_draft(&controller, &lifecycle).await;
            Err(anyhow!("product was not created; fix the fields above and retry"))
        }
        // The product exists; a saved draft would only create it a second time.
        SubmitOutcome::Failed {
            orphaned_product: Some(product_id),
        } => Err(anyhow!(
            "product {product_id} was created but its benefits were not attached; \
             rerun with --retry-attach {product_id}"
        )),
        SubmitOutcome::Failed {
            orphaned_product: None,
        } => {
            keep_as_draft(&controller, &lifecycle).await;
            Err(anyhow!("product was not created"))
        }
        SubmitOutcome::NothingToRetry => Err(anyhow!("no product is waiting for its benefits")),
        SubmitOutcome::AlreadySubmitting | SubmitOutcome::Closed => {
            Err(anyhow!("form is no longer accepting submissions"))
        }
    }
}

fn print_field_errors(snapshot: &FormSnapshot) {
    for (field, message) in snapshot.field_errors.iter() {
        eprintln!("{field}: {message}");
    }
}

/// Fires the page-hide signal and waits for the draft write to land.
async fn keep_as_draft(controller: &ProductCreateController, lifecycle: &PageLifecycle) {
    let mut events = controller.subscribe_events();
    if lifecycle.page_hide() == 0 {
        return;
    }
    let saved = tokio::time::timeout(DRAFT_SAVE_TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(FormEvent::DraftSaved) => return true,
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
    })
    .await
    .unwrap_or(false);
    if saved {
        println!("form values saved as draft");
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
