//! Data model: query descriptions, literal values, widget trees.

pub mod query;
pub mod value;
pub mod widget;

pub use query::{
    AggregateFunc, Condition, JoinKind, JoinRule, KindError, Payload, QColumn, Query, QueryKind,
    SourceQuery, TableKey, TableNode,
};
pub use value::Value;
pub use widget::{Dashboard, DashboardWidget, Layout, Widget};
