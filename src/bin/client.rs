use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use yumai::analytics::cart::Cart;
use yumai::analytics::DateRange;
use yumai::client::pages::{self, AiStep};
use yumai::client::{ApiClient, ClientError, Session};
use yumai::model::inventory::{InventoryPatch, InventoryPayload, InventoryQuery};
use yumai::model::menu::MenuItemPayload;
use yumai::model::user::{RegisterRequest, UpdateProfileRequest, UpdateSettingsRequest};

const HOST: &str = "http://localhost:8080";

#[derive(Parser, Debug)]
#[command(name = "yumai")]
#[command(about = "client cli used by restaurant staffs to run the dashboard pages against the server", version, long_about = None)]
struct Cli {
    #[arg(long, global = true, default_value = HOST, help = "Server base url")]
    host: String,
    #[arg(long, global = true, help = "Session file, defaults to $YUMAI_SESSION or ~/.yumai/session.json")]
    session: Option<PathBuf>,
    #[arg(long, global = true, help = "AI model for the insight pages")]
    model: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// sign in with a username or email
    #[command(arg_required_else_help = true)]
    Login { login: String, password: String },
    /// create an account
    #[command(arg_required_else_help = true)]
    Register(RegisterArgs),
    Logout,
    /// show or edit the signed-in profile
    Profile(ProfileArgs),
    /// restaurant settings
    Settings(SettingsArgs),
    #[command(arg_required_else_help = true)]
    ChangePassword { old_password: String, new_password: String },
    /// keep a provider key locally, sent with AI requests
    AiKey {
        #[arg(help = "Key to store, omit to forget the stored one")]
        key: Option<String>,
    },
    Dashboard,
    Reports {
        #[arg(long, default_value = "30", help = "7, 30, 90 or all")]
        range: String,
        #[arg(long, help = "Skip the executive summary")]
        no_ai: bool,
    },
    Forecast {
        #[arg(long, help = "Skip the AI forecast")]
        no_ai: bool,
    },
    Insights {
        #[arg(long, help = "Skip the AI insights")]
        no_ai: bool,
    },
    /// inventory related ops
    Inventory(InventoryArgs),
    /// menu related ops
    Menu(MenuArgs),
    /// menu and billing history
    Billing {
        #[arg(long, help = "Show the items of one billing record")]
        items: Option<i64>,
    },
    /// order the given menu items and pay right away
    #[command(arg_required_else_help = true)]
    Checkout {
        #[arg(long, help = "Customer name")]
        customer: Option<String>,
        #[arg(help = "Menu item ids, repeat an id for more than one", value_name = "MENU_ITEM_IDs", num_args = 1..)]
        items: Vec<i64>,
    },
}

#[derive(Debug, Args)]
struct RegisterArgs {
    username: String,
    email: String,
    password: String,
    #[arg(long, default_value = "")]
    first_name: String,
    #[arg(long, default_value = "")]
    last_name: String,
    #[arg(long, default_value = "")]
    restaurant: String,
}

#[derive(Debug, Args)]
struct ProfileArgs {
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    restaurant: Option<String>,
    #[arg(long)]
    theme: Option<String>,
    #[arg(long)]
    low_stock_threshold: Option<i32>,
    #[arg(long)]
    ai_model: Option<String>,
    #[arg(long, help = "Provider key kept on the server")]
    gemini_api_key: Option<String>,
}

#[derive(Debug, Args)]
struct SettingsArgs {
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    hours: Option<String>,
    #[arg(long)]
    tax_rate: Option<Decimal>,
    #[arg(long)]
    tip: Option<Decimal>,
    #[arg(long)]
    footer: Option<String>,
}

#[derive(Debug, Args)]
struct InventoryArgs {
    #[command(subcommand)]
    command: Option<InventoryCmds>,
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    category: Option<String>,
}

#[derive(Debug, Subcommand)]
enum InventoryCmds {
    #[command(arg_required_else_help = true)]
    Add {
        name: String,
        quantity: Decimal,
        #[arg(long, default_value = "")]
        unit: String,
        #[arg(long, default_value = "")]
        category: String,
    },
    #[command(arg_required_else_help = true)]
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        quantity: Option<Decimal>,
        #[arg(long)]
        unit: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    #[command(arg_required_else_help = true)]
    Remove { id: i64 },
    Low,
}

#[derive(Debug, Args)]
struct MenuArgs {
    #[command(subcommand)]
    command: MenuCmds,
}

#[derive(Debug, Subcommand)]
enum MenuCmds {
    List,
    #[command(arg_required_else_help = true)]
    Add { name: String, price: Decimal, category: String },
    #[command(arg_required_else_help = true)]
    Remove { id: i64 },
}

fn ai_step(no_ai: bool, model: &Option<String>) -> AiStep {
    if no_ai {
        AiStep::Skip
    } else {
        AiStep::Run { model: model.clone() }
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));
    let args = Cli::parse();

    let path = args
        .session
        .clone()
        .or_else(Session::default_path)
        .context("no session file location, pass --session")?;
    let client = ApiClient::with_session_file(&args.host, path)?;

    match run(&client, args).await {
        Err(ClientError::LoginRequired) => {
            println!("Your session has expired, sign in again with `client login`");
            Ok(())
        }
        other => Ok(other?),
    }
}

async fn run(client: &ApiClient, args: Cli) -> Result<(), ClientError> {
    let now = chrono::Utc::now();
    match args.command {
        Commands::Login { login, password } => {
            let res = client.login(&login, &password).await?;
            println!("{}, signed in as {}", res.message, res.user.username);
        }
        Commands::Register(r) => {
            let req = RegisterRequest {
                username: r.username,
                email: r.email,
                password2: r.password.clone(),
                password: r.password,
                first_name: r.first_name,
                last_name: r.last_name,
                restaurant_name: r.restaurant,
            };
            let res = client.register(&req).await?;
            println!("{}, signed in as {}", res.message, res.user.username);
        }
        Commands::Logout => {
            let res = client.logout().await?;
            println!("{}", res.message);
        }
        Commands::Profile(p) => {
            let req = UpdateProfileRequest {
                first_name: p.first_name,
                last_name: p.last_name,
                email: p.email,
                restaurant_name: p.restaurant,
                theme: p.theme,
                low_stock_threshold: p.low_stock_threshold,
                ai_model: p.ai_model,
                gemini_api_key: p.gemini_api_key,
                ..UpdateProfileRequest::default()
            };
            let edits = serde_json::to_value(&req).map_err(|e| ClientError::Decode(e.to_string()))?;
            let user = if edits.as_object().is_some_and(|o| o.values().all(|v| v.is_null())) {
                client.profile().await?
            } else {
                client.update_profile(&req).await?.user
            };
            println!("{} <{}> of {}", user.username, user.email, user.profile.restaurant_name);
            println!("  name:      {} {} ({})", user.first_name, user.last_name, user.profile.avatar_initials);
            println!("  role:      {}", user.profile.role);
            println!("  theme:     {}", user.profile.theme);
            println!("  low stock: <= {}", user.profile.low_stock_threshold);
            println!("  ai model:  {} (key stored: {})", user.profile.ai_model, user.profile.has_ai_key);
        }
        Commands::Settings(s) => {
            let req = UpdateSettingsRequest {
                restaurant_address: s.address,
                restaurant_phone: s.phone,
                restaurant_email: s.email,
                business_hours: s.hours,
                tax_rate: s.tax_rate,
                default_tip_percentage: s.tip,
                receipt_footer: s.footer,
            };
            let res = client.update_settings(&req).await?;
            println!("{}", res.message);
            println!("{}", serde_json::to_string_pretty(&res.settings).unwrap_or_default());
        }
        Commands::ChangePassword { old_password, new_password } => {
            let res = client.change_password(&old_password, &new_password).await?;
            println!("{}", res.message);
        }
        Commands::AiKey { key } => {
            let stored = key.is_some();
            client.update_session(|s| s.ai_key = key)?;
            println!("{}", if stored { "AI key saved locally" } else { "AI key removed" });
        }
        Commands::Dashboard => print!("{}", pages::dashboard(client, now).await?),
        Commands::Reports { range, no_ai } => {
            let range = DateRange::parse_or_default(&range);
            print!("{}", pages::reports(client, range, now, &ai_step(no_ai, &args.model)).await?);
        }
        Commands::Forecast { no_ai } => print!("{}", pages::forecast(client, &ai_step(no_ai, &args.model)).await?),
        Commands::Insights { no_ai } => print!("{}", pages::insights(client, &ai_step(no_ai, &args.model)).await?),
        Commands::Inventory(inv) => match inv.command {
            None => {
                let query = InventoryQuery { search: inv.search, category: inv.category };
                print!("{}", pages::inventory(client, &query).await?);
            }
            Some(InventoryCmds::Add { name, quantity, unit, category }) => {
                let item = client
                    .create_inventory_item(&InventoryPayload { name, category, quantity, unit })
                    .await?;
                println!("added inventory item #{} {}", item.id, item.name);
            }
            Some(InventoryCmds::Update { id, name, quantity, unit, category }) => {
                let item = client
                    .patch_inventory_item(id, &InventoryPatch { name, category, quantity, unit })
                    .await?;
                println!("#{} {} now {} {}", item.id, item.name, item.quantity, item.unit);
            }
            Some(InventoryCmds::Remove { id }) => {
                client.delete_inventory_item(id).await?;
                println!("removed inventory item #{}", id);
            }
            Some(InventoryCmds::Low) => {
                for item in client.low_stock().await? {
                    println!("  #{:<4} {:<24} {} {}", item.id, item.name, item.quantity, item.unit);
                }
            }
        },
        Commands::Menu(menu) => match menu.command {
            MenuCmds::List => {
                for item in client.menu().await? {
                    println!("  #{:<4} {:<24} {:<14} ${:.2}", item.id, item.name, item.category, item.price);
                }
            }
            MenuCmds::Add { name, price, category } => {
                let item = client.create_menu_item(&MenuItemPayload { name, price, category }).await?;
                println!("added menu item #{} {}", item.id, item.name);
            }
            MenuCmds::Remove { id } => {
                client.delete_menu_item(id).await?;
                println!("removed menu item #{}", id);
            }
        },
        Commands::Billing { items: Some(id) } => {
            for line in client.billing_items(id).await? {
                println!(
                    "  {:<24} x{:<3} {:>10}",
                    line.name.as_deref().unwrap_or("Unknown"),
                    line.quantity,
                    format!("${:.2}", line.subtotal)
                );
            }
        }
        Commands::Billing { items: None } => print!("{}", pages::billing(client).await?),
        Commands::Checkout { customer, items } => {
            let menu = client.menu().await?;
            let mut cart = Cart::new();
            for id in items {
                match menu.iter().find(|m| m.id == id) {
                    Some(item) => cart.add(item),
                    None => println!("menu item #{} not found, skipped", id),
                }
            }
            if cart.is_empty() {
                println!("nothing to check out");
                return Ok(());
            }
            println!("cart total ${:.2}", cart.total());
            let paid = pages::checkout(client, &cart, customer.as_deref()).await?;
            println!("{}: {} paid ${:.2}", paid.message, paid.order_number, paid.total_amount);
        }
    }
    Ok(())
}
