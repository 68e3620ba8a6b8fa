// std
use std::{
	sync::atomic::{AtomicBool, Ordering},
	time::Duration,
};
// crates.io
use color_eyre::Result;
use tokio::time;
// self
use redis_guard::{
	Coordinator, Error, config::CoordinatorConfig, id::LimiterKey, unit::TimeUnit, work::WorkError,
};

fn coordinator() -> Coordinator {
	Coordinator::in_memory(CoordinatorConfig::default())
}

#[tokio::test(start_paused = true)]
async fn login_window_admits_three_then_rejects() -> Result<()> {
	let coordinator = coordinator();
	let limiter = coordinator.limiter()?;
	let key = LimiterKey::new("api:login")?;
	let mut decisions = Vec::new();

	for _ in 0..4 {
		decisions.push(limiter.is_allowed(&key, 3, 60, TimeUnit::Seconds).await?);
	}

	assert_eq!(decisions, [true, true, true, false]);

	time::advance(Duration::from_secs(59)).await;

	assert!(!limiter.is_allowed_secs(&key, 3, 60).await?, "The window is still open.");

	time::advance(Duration::from_secs(1)).await;

	assert!(limiter.is_allowed_secs(&key, 3, 60).await?, "The window has expired.");

	Ok(())
}

#[tokio::test]
async fn keys_are_counted_independently() -> Result<()> {
	let coordinator = coordinator();
	let limiter = coordinator.limiter()?;
	let (a, b) = (LimiterKey::new("tenant:a")?, LimiterKey::new("tenant:b")?);

	assert!(limiter.is_allowed_secs(&a, 1, 60).await?);
	assert!(!limiter.is_allowed_secs(&a, 1, 60).await?);
	assert!(limiter.is_allowed_secs(&b, 1, 60).await?);

	Ok(())
}

#[tokio::test]
async fn rejected_allow_never_runs_work() -> Result<()> {
	let coordinator = coordinator();
	let limiter = coordinator.limiter()?;
	let key = LimiterKey::new("api:report")?;
	let invoked = AtomicBool::new(false);

	limiter.allow_secs(&key, 1, 30, || async { Ok::<_, WorkError>(()) }).await?;

	let err = limiter
		.allow(&key, 1, 30, TimeUnit::Seconds, || async {
			invoked.store(true, Ordering::SeqCst);

			Ok::<_, WorkError>(())
		})
		.await
		.expect_err("The second call exceeds the window.");

	assert!(err.is_rate_limited());
	assert!(matches!(
		err,
		Error::RateLimitExceeded { ref key, max: 1, ttl: 30, unit: TimeUnit::Seconds } if key == "api:report"
	));
	assert!(!invoked.load(Ordering::SeqCst));

	Ok(())
}

#[tokio::test]
async fn work_failures_use_the_closed_taxonomy() -> Result<()> {
	let coordinator = coordinator();
	let limiter = coordinator.limiter()?;
	let key = LimiterKey::new("api:taxonomy")?;
	let fatal = limiter
		.allow_secs(&key, 10, 60, || async {
			Err::<(), _>(WorkError::fatal(std::io::Error::other("oom")))
		})
		.await
		.expect_err("Fatal work should fail.");
	let wrapped = limiter
		.allow_secs(&key, 10, 60, || async {
			let dispatch = std::io::Error::other("dispatch failed");

			Err::<(), _>(WorkError::wrapped(dispatch, std::io::Error::other("socket closed")))
		})
		.await
		.expect_err("Wrapped work should fail.");

	assert!(matches!(fatal, Error::Fatal { .. }));
	assert!(matches!(wrapped, Error::Runtime { .. }));
	assert_eq!(wrapped.to_string(), "socket closed");

	Ok(())
}

#[tokio::test]
async fn disabled_limiter_is_reported() -> Result<()> {
	let config = CoordinatorConfig::from_json(r#"{"rate_limit":{"enabled":false}}"#)?;
	let coordinator = Coordinator::in_memory(config);

	assert!(coordinator.limiter().is_err());
	assert!(coordinator.locks().is_ok());

	Ok(())
}
