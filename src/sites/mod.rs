//! 查询站点实现

pub mod btk;
