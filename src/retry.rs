use std::fmt::Display;
use std::thread;
use std::time::Duration;

/// 默认最大尝试次数
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// 默认初始退避时间
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// 重试策略
///
/// 第 n 次（从 0 开始）失败后等待 `base_delay * 2^n` 再重试
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最大尝试次数（包含第一次），0 按 1 处理
    pub max_retries: u32,
    /// 初始退避时间
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self { max_retries, base_delay }
    }

    /// 实际尝试次数
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// 第 `attempt` 次失败后的等待时间
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_BASE_DELAY)
    }
}

/// 带指数退避的重试，所有错误都会重试
///
/// # 参数
/// - `policy`: 重试策略
/// - `op`: 要执行的操作
///
/// # 返回
/// 操作的成功结果，或最后一次的错误
pub fn retry<T, E, F>(policy: &RetryPolicy, op: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: Display,
{
    retry_if(policy, op, |_| true)
}

/// 带指数退避的重试，只重试 `should_retry` 返回 true 的错误
///
/// # 参数
/// - `policy`: 重试策略
/// - `op`: 要执行的操作
/// - `should_retry`: 判断错误是否值得重试（例如只重试网络层的临时错误）
///
/// # 返回
/// 操作的成功结果，或最后一次的错误
pub fn retry_if<T, E, F, P>(policy: &RetryPolicy, mut op: F, should_retry: P) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let attempts = policy.attempts();
    let mut attempt = 0;

    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt + 1 >= attempts || !should_retry(&e) {
                    return Err(e);
                }

                let delay = policy.delay_for(attempt);
                log::warn!(
                    "第 {}/{} 次尝试失败: {}，{:?} 后重试",
                    attempt + 1,
                    attempts,
                    e,
                    delay
                );
                thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}
