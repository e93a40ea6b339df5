//! 领域实体
//!
//! 所有状态枚举都以小写蛇形字符串持久化，`as_str` 与 `FromStr` 互为逆操作。

/// 为状态枚举生成 `as_str`、`Display` 与 `FromStr`
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = portal_errors::PortalError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(portal_errors::PortalError::Serialization(format!(
                        "无效的{}取值: {s}",
                        stringify!($name)
                    ))),
                }
            }
        }
    };
}

mod job;
mod project;

pub use job::*;
pub use project::*;
