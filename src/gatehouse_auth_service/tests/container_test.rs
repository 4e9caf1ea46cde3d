use testcontainers_modules::redis;
use testcontainers_modules::testcontainers::runners::AsyncRunner;

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn test_redis_container_starts() {
    let _container = redis::Redis::default().start().await.unwrap();
}
