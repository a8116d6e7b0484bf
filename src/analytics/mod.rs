//! Aggregations shared by the dashboard, reports, forecasting and insights pages.

pub mod cart;
pub mod daily;
pub mod report;
pub mod sales;

pub use daily::{daily_sales_sparse, daily_sales_trailing_week, DailySales, DateRange};
pub use sales::{aggregate_sales, sale_records, top_items, ItemSales, SaleRecord};
