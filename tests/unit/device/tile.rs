use super::*;

fn film() -> FilmParams {
    FilmParams::standard(false)
}

fn shared(width: usize, height: usize) -> SharedRenderBuffer {
    RenderBuffer::new(BufferParams::new(width, height, film()))
        .unwrap()
        .into_shared()
}

fn samples(start: u32, end: u32) -> SampleRange {
    SampleRange::new(start, end).unwrap()
}

#[test]
fn tile_outside_its_buffer_is_rejected() {
    let buffer = shared(4, 4);
    let ok = RenderTile::new(
        0,
        PixelRect::from_xywh(10, 10, 4, 4),
        TileTask::PathTrace,
        samples(0, 1),
        Arc::clone(&buffer),
        -(10 + 10 * 4),
        4,
    )
    .unwrap();
    assert_eq!(ok.state(), TileState::Idle);
    assert_eq!(ok.sample, 0);

    let too_wide = RenderTile::new(
        0,
        PixelRect::from_xywh(0, 0, 5, 4),
        TileTask::PathTrace,
        samples(0, 1),
        Arc::clone(&buffer),
        0,
        4,
    );
    assert!(matches!(too_wide, Err(EmberError::Validation(_))));

    let too_tall = RenderTile::new(
        0,
        PixelRect::from_xywh(0, 1, 4, 4),
        TileTask::PathTrace,
        samples(0, 1),
        buffer,
        0,
        4,
    );
    assert!(matches!(too_tall, Err(EmberError::Validation(_))));
}

#[test]
fn lifecycle_only_starts_from_idle() {
    let mut tile = RenderTile::new(
        3,
        PixelRect::from_xywh(0, 0, 2, 2),
        TileTask::Denoise,
        samples(0, 4),
        shared(2, 2),
        0,
        2,
    )
    .unwrap();
    tile.begin().unwrap();
    assert_eq!(tile.state(), TileState::Running);
    assert!(tile.begin().is_err());
    tile.finish(TileState::Completed);
    assert_eq!(tile.state(), TileState::Completed);
    tile.release();
    assert_eq!(tile.state(), TileState::Released);
    assert!(tile.begin().is_err());
}

#[test]
fn queue_covers_the_image_and_inflates_path_trace_tiles() {
    let image = PixelRect::from_xywh(0, 0, 10, 7);
    let queue =
        TileQueue::new(image, (4, 4), &film(), 2, TileTask::PathTrace, samples(0, 8)).unwrap();
    assert_eq!(queue.grid(), (3, 2));
    assert_eq!(queue.len(), 6);

    let mut tiles = Vec::new();
    while let Some(tile) = queue.acquire_tile() {
        tiles.push(tile);
    }
    assert_eq!(tiles.len(), 6);
    assert_eq!(tiles[0].rect(), PixelRect::new(-2, -2, 6, 6));
    assert_eq!(tiles[5].rect(), PixelRect::new(6, 2, 12, 9));

    let covered: usize = queue.layout().iter().map(|t| t.rect.area()).sum();
    assert_eq!(covered, image.area());

    for mut tile in tiles {
        tile.begin().unwrap();
        tile.finish(TileState::Completed);
        queue.release_tile(tile);
    }
    let outcomes = queue.outcomes();
    assert_eq!(outcomes.len(), 6);
    assert!(outcomes.iter().all(|o| o.state == TileState::Completed));

    queue.restart(TileTask::Denoise, samples(8, 8));
    assert!(queue.outcomes().is_empty());
    let tile = queue.acquire_tile().unwrap();
    assert_eq!(tile.task(), TileTask::Denoise);
    assert_eq!(tile.rect(), PixelRect::new(0, 0, 4, 4));
    assert_eq!(tile.sample, 8);
}

#[test]
fn grid_rounds_partial_tiles_up() {
    let image = PixelRect::from_xywh(5, 3, 9, 9);
    let queue =
        TileQueue::new(image, (3, 5), &film(), 0, TileTask::Denoise, samples(1, 1)).unwrap();
    assert_eq!(queue.grid(), (3, 2));
    let layout = queue.layout();
    assert_eq!(layout.last().map(|t| t.rect), Some(PixelRect::new(11, 8, 14, 12)));

    let exact = TileQueue::new(
        PixelRect::from_xywh(0, 0, 8, 8),
        (4, 4),
        &film(),
        0,
        TileTask::Denoise,
        samples(1, 1),
    )
    .unwrap();
    assert_eq!(exact.grid(), (2, 2));
}

#[test]
fn corner_tile_sees_only_existing_neighbors() {
    let image = PixelRect::from_xywh(0, 0, 12, 12);
    let queue =
        TileQueue::new(image, (4, 4), &film(), 0, TileTask::Denoise, samples(1, 1)).unwrap();
    let corner = queue.acquire_tile().unwrap();
    let neighbors = queue.neighbor_tiles(&corner);
    let present: Vec<usize> = (0..9).filter(|&i| neighbors.tiles[i].is_some()).collect();
    assert_eq!(present, vec![4, 5, 7, 8]);
    assert_eq!(neighbors.extent(corner.rect()), PixelRect::new(0, 0, 8, 8));

    let locks = ReadLocks::acquire(&neighbors).unwrap();
    let view = neighbors.view(corner.rect(), &locks, film().pass_denoising).unwrap();
    assert_eq!(view.extent(), PixelRect::new(0, 0, 8, 8));
    assert!(view.denoising(5, 5, 0).is_some());
    assert!(view.denoising(8, 0, 0).is_none());
}

#[test]
fn shared_buffer_is_locked_once() {
    let buffer = shared(8, 4);
    let left = NeighborTile {
        rect: PixelRect::from_xywh(0, 0, 4, 4),
        buffer: Arc::clone(&buffer),
        offset: 0,
        stride: 8,
    };
    let right = NeighborTile {
        rect: PixelRect::from_xywh(4, 0, 4, 4),
        ..left.clone()
    };
    let mut neighbors = TileNeighbors::default();
    neighbors.tiles[4] = Some(left);
    neighbors.tiles[5] = Some(right);

    let locks = ReadLocks::acquire(&neighbors).unwrap();
    assert_eq!(locks.guards.len(), 1);
    let view = neighbors
        .view(PixelRect::from_xywh(0, 0, 4, 4), &locks, film().pass_denoising)
        .unwrap();
    assert!(view.denoising(6, 2, 0).is_some());
}
