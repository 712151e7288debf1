//! 国旗回应检测
//!
//! - `reaction`: 识别回应元素并提取国旗
//! - `association`: 把回应关联到消息容器
//! - `diagnostics`: 离线诊断工具

pub mod association;
pub mod diagnostics;
pub mod reaction;

pub use association::{
    find_message_container, ContainerStrategy, CONTAINER_SELECTORS, MESSAGE_CONTAINER_SELECTOR,
};
pub use diagnostics::{describe, diagnose, find_all_flags, Diagnosis, FlagElement};
pub use reaction::{detect, extract_flag, find_candidates, is_reaction, ReactionEvent, REACTION_SELECTORS};
