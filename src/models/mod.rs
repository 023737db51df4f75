// 领域数据模型
// 包含区域、坐标点以及上游服务返回的记录类型

pub mod area;
pub mod location;

pub use area::{ActivationRecord, Area, AreaKind};
pub use location::{GeoPoint, UserLocationRecord};
