use warp::Reply;

pub async fn handle_healthz() -> Result<Box<dyn Reply>, warp::Rejection> {
    Ok(Box::new(warp::reply::with_status("ok", warp::http::StatusCode::OK)))
}
