use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

use delivery_tracker::models::{Route, RoutePatch};
use delivery_tracker::repositories::{InMemoryRouteStore, RouteStore};
use delivery_tracker::services::{LocalPhotoStorage, PhotoPayload, PhotoStorage, RouteService};
use delivery_tracker::utils::errors::{StoreError, StoreResult};

/// Almacenamiento que siempre falla
struct FailingPhotoStorage;

#[async_trait]
impl PhotoStorage for FailingPhotoStorage {
    async fn upload(&self, _photo: PhotoPayload) -> StoreResult<String> {
        Err(StoreError::Upload("bucket unavailable".to_string()))
    }
}

fn photo_dir() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("delivery-tracker-service-{}", Uuid::new_v4()))
}

fn create_service() -> RouteService {
    let photos = LocalPhotoStorage::new(photo_dir(), "http://localhost:3000/photos");
    RouteService::new(Arc::new(InMemoryRouteStore::new()), Arc::new(photos))
}

#[tokio::test]
async fn test_deliveries_complete_route_then_reject() {
    let service = create_service();
    let route = service.create_route(5, 10, None).await.unwrap();
    assert_eq!(route.delivered_count, 0);
    assert!(route.deliveries.is_empty());

    for i in 1..=10 {
        let updated = service.register_delivery(route.id, None, None).await.unwrap();
        assert_eq!(updated.delivered_count, i);
    }

    let stored = service.get_route(route.id).await.unwrap();
    assert!(stored.is_complete());
    assert_eq!(stored.deliveries.len(), 10);
    assert_eq!(stored.progress_percent(), 100);

    let err = service.register_delivery(route.id, None, None).await.unwrap_err();
    assert!(matches!(err, StoreError::OverDelivery { package_count: 10, .. }));
    assert_eq!(service.get_route(route.id).await.unwrap().delivered_count, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deliveries_never_exceed_package_count() {
    let service = create_service();
    let route = service.create_route(3, 5, None).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.register_delivery(route.id, None, None).await
        }));
    }

    let mut accepted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(StoreError::OverDelivery { .. }) => rejected += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(accepted, 5);
    assert_eq!(rejected, 15);

    let stored = service.get_route(route.id).await.unwrap();
    assert_eq!(stored.delivered_count, 5);
    assert_eq!(stored.deliveries.len(), 5);
}

#[tokio::test]
async fn test_upload_failure_leaves_route_unchanged() {
    let service = RouteService::new(Arc::new(InMemoryRouteStore::new()), Arc::new(FailingPhotoStorage));
    let route = service.create_route(1, 3, None).await.unwrap();

    let photo = PhotoPayload::new(vec![1, 2, 3], None);
    let err = service
        .register_delivery(route.id, Some(photo), Some("fachada".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Upload(_)));

    let stored = service.get_route(route.id).await.unwrap();
    assert_eq!(stored.delivered_count, 0);
    assert!(stored.deliveries.is_empty());
}

#[tokio::test]
async fn test_delivery_with_photo_and_note() {
    let service = create_service();
    let route = service.create_route(1, 2, None).await.unwrap();

    let photo = PhotoPayload::new(vec![0xFF, 0xD8, 0xFF], None);
    let updated = service
        .register_delivery(route.id, Some(photo), Some("  deixado na portaria ".to_string()))
        .await
        .unwrap();

    let delivery = &updated.deliveries[0];
    assert_eq!(delivery.note.as_deref(), Some("deixado na portaria"));
    let url = delivery.photo_url.as_deref().unwrap();
    assert!(url.starts_with("http://localhost:3000/photos/entregas/"));
    assert!(url.ends_with(".jpg"));

    // Una nota en blanco no se guarda
    let updated = service
        .register_delivery(route.id, None, Some("   ".to_string()))
        .await
        .unwrap();
    assert_eq!(updated.deliveries[1].note, None);
    assert_eq!(updated.deliveries[1].photo_url, None);
}

#[tokio::test]
async fn test_invalid_input_is_rejected_before_writing() {
    let service = create_service();

    assert!(matches!(service.create_route(0, 5, None).await, Err(StoreError::Validation(_))));
    assert!(matches!(service.create_route(5, -2, None).await, Err(StoreError::Validation(_))));
    assert!(matches!(
        service.create_route(1, i64::from(i32::MAX) + 1, None).await,
        Err(StoreError::Validation(_))
    ));
    assert!(service.list_routes().await.unwrap().is_empty());

    let missing = Uuid::new_v4();
    assert!(matches!(
        service.register_delivery(missing, None, None).await,
        Err(StoreError::NotFound(id)) if id == missing
    ));
    assert!(matches!(
        service.update_route(missing, RoutePatch::new(Some(2), None).unwrap()).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_then_list() {
    let service = create_service();
    let keep = service.create_route(1, 1, None).await.unwrap();
    let gone = service.create_route(2, 2, None).await.unwrap();

    service.delete_route(gone.id).await.unwrap();
    service.delete_route(gone.id).await.unwrap();

    let routes = service.list_routes().await.unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].id, keep.id);
    assert!(matches!(service.get_route(gone.id).await, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_subscription_receives_snapshots_until_cancelled() {
    let service = create_service();
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<Route>>();

    let subscription = service.subscribe(move |routes| {
        let _ = tx.send(routes.to_vec());
    });

    let initial = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
    assert!(initial.is_empty());

    let route = service.create_route(4, 8, None).await.unwrap();
    let snapshot = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, route.id);

    service.register_delivery(route.id, None, None).await.unwrap();
    let snapshot = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
    assert_eq!(snapshot[0].delivered_count, 1);

    service
        .update_route(route.id, RoutePatch::new(Some(9), None).unwrap())
        .await
        .unwrap();
    let snapshot = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
    assert_eq!(snapshot[0].stop_count, 9);
    assert_eq!(snapshot[0].delivered_count, 1);

    let other = service.create_route(2, 2, None).await.unwrap();
    let snapshot = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].id, other.id);

    service.delete_route(route.id).await.unwrap();
    let snapshot = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.iter().all(|r| r.id != route.id));

    subscription.cancel();
    assert!(subscription.is_cancelled());

    service.create_route(1, 1, None).await.unwrap();
    // El canal se cierra al soltar el callback, sin más snapshots
    assert!(timeout(Duration::from_secs(1), rx.recv()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_callback_is_never_invoked_concurrently() {
    let service = create_service();
    let active = Arc::new(Mutex::new(false));
    let overlaps = Arc::new(Mutex::new(0usize));
    let (tx, mut rx) = mpsc::unbounded_channel::<usize>();

    let subscription = {
        let active = Arc::clone(&active);
        let overlaps = Arc::clone(&overlaps);
        service.subscribe(move |routes| {
            {
                let mut flag = active.lock().unwrap();
                if *flag {
                    *overlaps.lock().unwrap() += 1;
                }
                *flag = true;
            }
            std::thread::sleep(Duration::from_millis(5));
            *active.lock().unwrap() = false;
            let _ = tx.send(routes.len());
        })
    };

    for _ in 0..5 {
        service.create_route(1, 1, None).await.unwrap();
    }

    // Esperar hasta ver las cinco rutas
    let mut last = 0;
    while last < 5 {
        last = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    }

    subscription.cancel();
    assert_eq!(*overlaps.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_store_publishes_changes() {
    let store: Arc<dyn RouteStore> = Arc::new(InMemoryRouteStore::new());
    let mut changes = store.changes();

    let route = store
        .create(delivery_tracker::models::NewRoute::new(1, 1, None).unwrap())
        .await
        .unwrap();
    let change = changes.recv().await.unwrap();
    assert_eq!(change.route_id(), Some(route.id));
}

/// Requiere una base de datos: `DATABASE_URL=postgres://... cargo test -- --ignored`
#[tokio::test]
#[ignore]
async fn test_postgres_store_rejects_over_delivery() {
    use delivery_tracker::config::DatabaseConfig;
    use delivery_tracker::database::DatabaseConnection;
    use delivery_tracker::repositories::{PgRouteStore, RouteFeed};

    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let connection = DatabaseConnection::connect(&DatabaseConfig::new(url)).await.unwrap();
    connection.run_migrations().await.unwrap();

    let store = PgRouteStore::new(connection.pool().clone(), RouteFeed::default());
    let photos = LocalPhotoStorage::new(photo_dir(), "http://localhost:3000/photos");
    let service = RouteService::new(Arc::new(store), Arc::new(photos));

    let route = service.create_route(2, 3, None).await.unwrap();
    let mut handles = Vec::new();
    for _ in 0..6 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.register_delivery(route.id, None, None).await
        }));
    }
    let accepted = futures::future::join_all(handles)
        .await
        .into_iter()
        .filter(|result| matches!(result, Ok(Ok(_))))
        .count();

    assert_eq!(accepted, 3);
    assert_eq!(service.get_route(route.id).await.unwrap().delivered_count, 3);

    service.delete_route(route.id).await.unwrap();
}
