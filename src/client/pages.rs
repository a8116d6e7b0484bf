//! One function per dashboard page: concurrent reads, local aggregation, then at
//! most one AI request. Each page renders through `Display`.

use std::fmt;

use chrono::{DateTime, Utc};
use log::{info, warn};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::ai::{ExecutiveReport, Feature, ForecastEntry, ForecastFeature, Insights, InsightsFeature, ReportFeature};
use crate::analytics::cart::Cart;
use crate::analytics::report::{forecast_inputs, insights_payload, report_metrics, ForecastInput, InsightsPayload, ReportMetrics};
use crate::analytics::sales::merge_by_name;
use crate::analytics::{aggregate_sales, daily_sales_trailing_week, sale_records, top_items, DailySales, DateRange, ItemSales};
use crate::client::api::{ApiClient, ClientError};
use crate::model::billing::BillingRecord;
use crate::model::dashboard::DashboardStats;
use crate::model::inventory::{InventoryItem, InventoryQuery, InventoryStats};
use crate::model::menu::MenuItem;
use crate::model::order::PayOrderResponse;

const DASHBOARD_TOP_ITEMS: usize = 5;

/// Whether a page asks the provider for its document, and with which model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AiStep {
    #[default]
    Skip,
    Run { model: Option<String> },
}

/// The AI part of a page. A failure stays local to the page.
#[derive(Debug, Clone, PartialEq)]
pub enum AiSection<T> {
    Skipped,
    Ready(T),
    Failed(String),
}

async fn run_ai<F: Feature>(client: &ApiClient, step: &AiStep, payload: &impl Serialize) -> AiSection<F::Output> {
    let AiStep::Run { model } = step else {
        return AiSection::Skipped;
    };
    let data = match serde_json::to_value(payload) {
        Ok(data) => data,
        Err(e) => return AiSection::Failed(e.to_string()),
    };
    match client.generate::<F>(model.as_deref(), data).await {
        Ok(output) => AiSection::Ready(output),
        Err(e) => {
            warn!("{} generation failed, {}", F::NAME, e);
            AiSection::Failed(e.to_string())
        }
    }
}

fn money(amount: Decimal) -> String {
    format!("${:.2}", amount.round_dp(2))
}

fn write_list(f: &mut fmt::Formatter<'_>, title: &str, items: &[String]) -> fmt::Result {
    writeln!(f, "{title}:")?;
    if items.is_empty() {
        return writeln!(f, "  None");
    }
    items.iter().try_for_each(|item| writeln!(f, "  - {item}"))
}

fn write_ai<T>(
    f: &mut fmt::Formatter<'_>,
    section: &AiSection<T>,
    ready: impl FnOnce(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    match section {
        AiSection::Skipped => Ok(()),
        AiSection::Failed(e) => writeln!(f, "\nAI unavailable: {e}"),
        AiSection::Ready(output) => {
            writeln!(f)?;
            ready(f, output)
        }
    }
}

fn write_daily(f: &mut fmt::Formatter<'_>, days: &[DailySales]) -> fmt::Result {
    days.iter().try_for_each(|d| writeln!(f, "  {:<10} {:>10}", d.date, money(d.amount)))
}

// dashboard

#[derive(Debug, Clone)]
pub struct DashboardPage {
    pub stats: DashboardStats,
    /// zero-filled, oldest first
    pub week: Vec<DailySales>,
    pub top_items: Vec<ItemSales>,
    pub low_stock: Vec<InventoryItem>,
}

pub async fn dashboard(client: &ApiClient, now: DateTime<Utc>) -> Result<DashboardPage, ClientError> {
    let (stats, orders, billing, menu, low_stock) = tokio::try_join!(
        client.dashboard_stats(),
        client.orders(None),
        client.billing_history(),
        client.menu(),
        client.low_stock(),
    )?;
    let records = sale_records(&orders, &billing, &menu);
    Ok(DashboardPage {
        stats,
        week: daily_sales_trailing_week(&records, now.date_naive()),
        top_items: top_items(&merge_by_name(&records), DASHBOARD_TOP_ITEMS),
        low_stock,
    })
}

impl fmt::Display for DashboardPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dashboard")?;
        writeln!(f, "  Sales today:      {}", money(self.stats.total_sales_today))?;
        writeln!(f, "  Orders today:     {}", self.stats.total_orders_today)?;
        writeln!(f, "  Inventory items:  {}", self.stats.total_inventory_items)?;
        writeln!(f, "  Low stock:        {} items", self.low_stock.len())?;
        writeln!(f, "\nLast 7 days:")?;
        write_daily(f, &self.week)?;
        writeln!(f, "\nTop sellers:")?;
        self.top_items
            .iter()
            .try_for_each(|i| writeln!(f, "  {:<24} {:>5} sold {:>10}", i.name, i.quantity_sold, money(i.revenue)))
    }
}

// reports

#[derive(Debug, Clone)]
pub struct ReportsPage {
    pub metrics: ReportMetrics,
    pub ai: AiSection<ExecutiveReport>,
}

pub async fn reports(
    client: &ApiClient,
    range: DateRange,
    now: DateTime<Utc>,
    ai: &AiStep,
) -> Result<ReportsPage, ClientError> {
    let everything = InventoryQuery::default();
    let (orders, billing, inventory, menu) = tokio::try_join!(
        client.orders(None),
        client.billing_history(),
        client.inventory(&everything),
        client.menu(),
    )?;
    let records = sale_records(&orders, &billing, &menu);
    let metrics = report_metrics(&records, &inventory, range, now);
    info!("report over range={} covers {} orders", range, metrics.total_orders);
    let ai = run_ai::<ReportFeature>(client, ai, &metrics).await;
    Ok(ReportsPage { metrics, ai })
}

impl fmt::Display for ReportsPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.metrics;
        let range = if m.range == "all" { "all time".to_string() } else { format!("last {} days", m.range) };
        writeln!(f, "Reports ({range})")?;
        writeln!(f, "  Orders: {}", m.total_orders)?;
        writeln!(f, "  Sales:  {}", money(m.total_sales))?;
        writeln!(f, "\nDaily sales:")?;
        write_daily(f, &m.daily_sales)?;
        writeln!(f, "\nTop items:")?;
        m.top_items
            .iter()
            .try_for_each(|t| writeln!(f, "  {:<24} {:<14} {:>5}", t.name, t.category, t.qty))?;
        writeln!(f, "\nLow stock:")?;
        m.low_stock
            .iter()
            .try_for_each(|i| writeln!(f, "  {:<24} {} {}", i.name, i.quantity, i.unit))?;
        write_ai(f, &self.ai, |f, report| {
            writeln!(f, "Executive summary: {}", report.summary)?;
            write_list(f, "Highlights", &report.highlights)?;
            write_list(f, "Risks", &report.risks)?;
            write_list(f, "Suggestions", &report.suggestions)
        })
    }
}

// forecasting

#[derive(Debug, Clone)]
pub struct ForecastPage {
    pub inputs: Vec<ForecastInput>,
    pub ai: AiSection<Vec<ForecastEntry>>,
}

pub async fn forecast(client: &ApiClient, ai: &AiStep) -> Result<ForecastPage, ClientError> {
    let everything = InventoryQuery::default();
    let (orders, billing, inventory, menu) = tokio::try_join!(
        client.orders(None),
        client.billing_history(),
        client.inventory(&everything),
        client.menu(),
    )?;
    let sales = aggregate_sales(&orders, &billing, &menu);
    let inputs = forecast_inputs(&sales, &menu, &inventory);
    let ai = run_ai::<ForecastFeature>(client, ai, &inputs).await;
    Ok(ForecastPage { inputs, ai })
}

impl fmt::Display for ForecastPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Forecasting inputs")?;
        for row in &self.inputs {
            let stock = row.current_stock.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
            writeln!(f, "  {:<24} {:<14} sold {:>5} stock {:>8}", row.name, row.category, row.sold_last_period, stock)?;
        }
        write_ai(f, &self.ai, |f, entries| {
            writeln!(f, "7-day forecast:")?;
            if entries.is_empty() {
                return writeln!(f, "  None");
            }
            entries.iter().try_for_each(|e| {
                writeln!(
                    f,
                    "  {:<24} predicted {:>7.1} reorder {:>7.1}  {}",
                    e.item_name, e.predicted_next_7_days, e.recommended_reorder, e.reasoning
                )
            })
        })
    }
}

// insights

#[derive(Debug, Clone)]
pub struct InsightsPage {
    pub payload: InsightsPayload,
    pub ai: AiSection<Insights>,
}

pub async fn insights(client: &ApiClient, ai: &AiStep) -> Result<InsightsPage, ClientError> {
    let everything = InventoryQuery::default();
    let (orders, billing, inventory, menu) = tokio::try_join!(
        client.orders(None),
        client.billing_history(),
        client.inventory(&everything),
        client.menu(),
    )?;
    let sales = aggregate_sales(&orders, &billing, &menu);
    let payload = insights_payload(&sales, &orders, &billing, &menu, &inventory);
    let ai = run_ai::<InsightsFeature>(client, ai, &payload).await;
    Ok(InsightsPage { payload, ai })
}

impl fmt::Display for InsightsPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "AI insights")?;
        writeln!(f, "  Orders:  {}", self.payload.total_orders)?;
        writeln!(f, "  Revenue: {}", money(self.payload.total_revenue))?;
        writeln!(f, "  Items sold: {}", self.payload.sales_summary.len())?;
        write_ai(f, &self.ai, |f, insights| {
            write_list(f, "Fast sellers", &insights.fast_sellers)?;
            write_list(f, "Slow movers", &insights.slow_movers)?;
            write_list(f, "Price opportunities", &insights.price_opportunities)?;
            write_list(f, "Combo suggestions", &insights.combo_suggestions)?;
            write_list(f, "Waste reduction", &insights.waste_reduction)
        })
    }
}

// inventory

#[derive(Debug, Clone)]
pub struct InventoryPage {
    pub items: Vec<InventoryItem>,
    pub stats: InventoryStats,
}

pub async fn inventory(client: &ApiClient, query: &InventoryQuery) -> Result<InventoryPage, ClientError> {
    let (items, stats) = tokio::try_join!(client.inventory(query), client.inventory_stats())?;
    Ok(InventoryPage { items, stats })
}

impl fmt::Display for InventoryPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Inventory: {} items, {} low, {} categories",
            self.stats.total_items, self.stats.low_stock_items, self.stats.categories
        )?;
        for item in &self.items {
            let status = if item.status.is_low() { "Low Stock" } else { "In Stock" };
            writeln!(
                f,
                "  #{:<4} {:<24} {:<14} {:>8} {:<5} {}",
                item.id, item.name, item.category, item.quantity, item.unit, status
            )?;
        }
        Ok(())
    }
}

// billing

#[derive(Debug, Clone)]
pub struct BillingPage {
    pub menu: Vec<MenuItem>,
    pub history: Vec<BillingRecord>,
}

pub async fn billing(client: &ApiClient) -> Result<BillingPage, ClientError> {
    let (menu, history) = tokio::try_join!(client.menu(), client.billing_history())?;
    Ok(BillingPage { menu, history })
}

impl fmt::Display for BillingPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Menu")?;
        for item in &self.menu {
            writeln!(f, "  #{:<4} {:<24} {:<14} {:>8}", item.id, item.name, item.category, money(item.price))?;
        }
        writeln!(f, "\nBilling history")?;
        for record in &self.history {
            let date = record
                .order_date
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            writeln!(
                f,
                "  #{:<4} {:<24} {:<18} {:>10} {}",
                record.id, record.order_number, record.customer_name, money(record.total_amount), date
            )?;
        }
        Ok(())
    }
}

/// Place the cart as an order and pay it straight away.
pub async fn checkout(client: &ApiClient, cart: &Cart, customer_name: Option<&str>) -> Result<PayOrderResponse, ClientError> {
    let order = client.create_order(&cart.to_order_request(customer_name)).await?;
    info!("created order={} for {}", order.order_number, order.customer_name);
    client.pay_order(order.id).await
}
