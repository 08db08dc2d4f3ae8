//! The row-rendering worker pool.
//!
//! N threads share a queue of viewport row indices plus two counting
//! semaphores. Per frame the main thread publishes the frame job, posts
//! `start` once per worker, queues the dirty rows, then queues one `-1`
//! sentinel per worker and waits on `done` as many times: that final
//! wait is the fence after which no worker touches the buffer. The
//! semaphores count frames and the condvar guards queue emptiness; they
//! are deliberately separate primitives.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use log::debug;

use super::painter::{self, CanvasPtr, PaintParams};
use crate::term::cell::Row;

/// Per-worker end-of-frame sentinel.
const FRAME_DONE: i32 = -1;
/// Per-worker shutdown sentinel.
const SHUTDOWN: i32 = -2;

/// Counting semaphore on a mutex/condvar pair.
struct Semaphore {
    count: Mutex<u32>,
    cond: Condvar,
}

impl Semaphore {
    fn new() -> Self {
        Self {
            count: Mutex::new(0),
            cond: Condvar::new(),
        }
    }

    fn post(&self, n: u32) {
        let mut count = self.count.lock().unwrap();
        *count += n;
        self.cond.notify_all();
    }

    fn wait(&self) {
        let mut count = self.count.lock().unwrap();
        while *count == 0 {
            count = self.cond.wait(count).unwrap();
        }
        *count -= 1;
    }
}

/// Pointer to one dispatched row. Null for rows that stay clean.
pub(crate) struct RowPtr(pub *mut Row);

/// Everything a worker needs for one frame.
///
/// Row pointers are materialized on the main thread before the `start`
/// posts, so no two threads ever derive overlapping mutable borrows of
/// the grid: each queued index maps to a distinct `Row`.
pub(crate) struct FrameJob {
    pub canvas: CanvasPtr,
    pub rows: Vec<RowPtr>,
    pub params: PaintParams,
}

// SAFETY: the frame job is only dereferenced inside the start -> done
// window. Within it the main thread touches neither the canvas nor the
// grid, each row index is queued at most once, and the done fence
// orders all worker writes before the main thread resumes.
unsafe impl Send for FrameJob {}
unsafe impl Sync for FrameJob {}

struct Shared {
    queue: Mutex<VecDeque<i32>>,
    cond: Condvar,
    start: Semaphore,
    done: Semaphore,
    job: Mutex<Option<Arc<FrameJob>>>,
}

pub struct WorkerPool {
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `count` render workers. Zero means all rendering happens
    /// inline on the calling thread.
    pub fn new(count: usize) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            cond: Condvar::new(),
            start: Semaphore::new(),
            done: Semaphore::new(),
            job: Mutex::new(None),
        });
        let handles = (0..count)
            .map(|id| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("render-{}", id))
                    .spawn(move || worker_main(shared))
                    .expect("failed to spawn render worker")
            })
            .collect();
        debug!("spawned {} render workers", count);
        Self { shared, handles }
    }

    pub fn count(&self) -> usize {
        self.handles.len()
    }

    /// Publishes the frame job and releases every worker into the queue
    /// loop. Must be balanced by [`WorkerPool::finish_frame`].
    pub(crate) fn begin_frame(&self, job: FrameJob) {
        debug_assert!(!self.handles.is_empty());
        *self.shared.job.lock().unwrap() = Some(Arc::new(job));
        self.shared.start.post(self.handles.len() as u32);
    }

    /// Queues one dirty viewport row.
    pub(crate) fn dispatch_row(&self, r: usize) {
        let mut queue = self.shared.queue.lock().unwrap();
        queue.push_back(r as i32);
        self.shared.cond.notify_one();
    }

    /// Queues the frame-done sentinels and blocks until every worker has
    /// consumed one. After this returns no worker touches the buffer.
    pub(crate) fn finish_frame(&self) {
        let n = self.handles.len();
        {
            let mut queue = self.shared.queue.lock().unwrap();
            for _ in 0..n {
                queue.push_back(FRAME_DONE);
            }
            self.shared.cond.notify_all();
        }
        for _ in 0..n {
            self.shared.done.wait();
        }
        *self.shared.job.lock().unwrap() = None;
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let n = self.handles.len();
        if n == 0 {
            return;
        }
        {
            let mut queue = self.shared.queue.lock().unwrap();
            for _ in 0..n {
                queue.push_back(SHUTDOWN);
            }
            self.shared.cond.notify_all();
        }
        // Workers parked on `start` need releasing before they can see
        // the shutdown sentinels.
        self.shared.start.post(n as u32);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_main(shared: Arc<Shared>) {
    loop {
        shared.start.wait();
        let job = shared.job.lock().unwrap().clone();
        loop {
            let r = {
                let mut queue = shared.queue.lock().unwrap();
                loop {
                    if let Some(r) = queue.pop_front() {
                        break r;
                    }
                    queue = shared.cond.wait(queue).unwrap();
                }
            };
            match r {
                FRAME_DONE => {
                    shared.done.post(1);
                    break;
                }
                SHUTDOWN => return,
                r => {
                    if let Some(job) = job.as_deref() {
                        let ptr = job.rows[r as usize].0;
                        if !ptr.is_null() {
                            // SAFETY: this index was queued exactly once
                            // for this frame, so the pointed-to row has a
                            // single writer until the done fence.
                            let row = unsafe { &mut *ptr };
                            painter::render_row(&job.params, &job.canvas, row, r as usize);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semaphore_counts_posts() {
        let sem = Arc::new(Semaphore::new());
        sem.post(2);
        sem.wait();
        sem.wait();

        let sem2 = Arc::clone(&sem);
        let handle = thread::spawn(move || {
            sem2.wait();
        });
        // Give the thread a moment to block, then release it.
        thread::sleep(std::time::Duration::from_millis(20));
        sem.post(1);
        handle.join().unwrap();
    }

    #[test]
    fn empty_pool_shuts_down_cleanly() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.count(), 0);
        drop(pool);
    }

    #[test]
    fn idle_pool_joins_on_drop() {
        let pool = WorkerPool::new(4);
        assert_eq!(pool.count(), 4);
        drop(pool);
    }

    #[test]
    fn pool_survives_a_frame_with_no_rows() {
        use crate::font::{Font, FontExtents, Glyph, LineMetrics};
        use crate::render::color::Palette;
        use crate::term::selection::Selection;
        use crate::term::CursorStyle;

        struct NoFont;
        impl Font for NoFont {
            fn glyph_for(&self, _wc: char) -> Option<Glyph> {
                None
            }
            fn extents(&self) -> FontExtents {
                FontExtents {
                    height: 16,
                    ascent: 12,
                    descent: 4,
                    max_advance: 8,
                }
            }
            fn underline(&self) -> LineMetrics {
                LineMetrics {
                    position: -2,
                    thickness: 1,
                }
            }
            fn strikeout(&self) -> LineMetrics {
                LineMetrics {
                    position: 4,
                    thickness: 1,
                }
            }
        }

        fn job(buf: &mut [u8]) -> FrameJob {
            FrameJob {
                canvas: CanvasPtr::from_slice(buf, 64, 16, 64 * 4),
                rows: Vec::new(),
                params: PaintParams {
                    font: Arc::new(NoFont),
                    palette: Palette::default(),
                    selection: Selection::NONE,
                    view: 0,
                    num_ring_rows: 1,
                    cell_width: 8,
                    cell_height: 16,
                    scale: 1,
                    cursor_style: CursorStyle::Block,
                    reverse_video: false,
                    blink_off: false,
                },
            }
        }

        let pool = WorkerPool::new(2);
        let mut buf = vec![0u8; 64 * 16 * 4];
        pool.begin_frame(job(&mut buf));
        pool.finish_frame();
        // A second frame keeps the start/done rendezvous balanced.
        pool.begin_frame(job(&mut buf));
        pool.finish_frame();
    }

    /// After finish_frame returns, every dispatched row has been written
    /// and its cells are clean: the done fence is total.
    #[test]
    fn finish_frame_fences_row_writes() {
        use crate::font::{Font, FontExtents, Glyph, LineMetrics};
        use crate::render::color::Palette;
        use crate::term::selection::Selection;
        use crate::term::CursorStyle;

        struct NoFont;
        impl Font for NoFont {
            fn glyph_for(&self, _wc: char) -> Option<Glyph> {
                None
            }
            fn extents(&self) -> FontExtents {
                FontExtents {
                    height: 16,
                    ascent: 12,
                    descent: 4,
                    max_advance: 8,
                }
            }
            fn underline(&self) -> LineMetrics {
                LineMetrics {
                    position: -2,
                    thickness: 1,
                }
            }
            fn strikeout(&self) -> LineMetrics {
                LineMetrics {
                    position: 4,
                    thickness: 1,
                }
            }
        }

        const ROWS: usize = 6;
        const COLS: usize = 8;
        let width = (COLS * 8) as i32;
        let height = (ROWS * 16) as i32;
        let mut buf = vec![0u8; (width * height * 4) as usize];
        let mut rows: Vec<Row> = (0..ROWS).map(|_| Row::new(COLS)).collect();

        let pool = WorkerPool::new(3);
        let job = FrameJob {
            canvas: CanvasPtr::from_slice(&mut buf, width, height, width * 4),
            rows: rows.iter_mut().map(|row| RowPtr(row as *mut Row)).collect(),
            params: PaintParams {
                font: Arc::new(NoFont),
                palette: Palette::default(),
                selection: Selection::NONE,
                view: 0,
                num_ring_rows: ROWS,
                cell_width: 8,
                cell_height: 16,
                scale: 1,
                cursor_style: CursorStyle::Block,
                reverse_video: false,
                blink_off: false,
            },
        };
        pool.begin_frame(job);
        for r in 0..ROWS {
            pool.dispatch_row(r);
        }
        pool.finish_frame();

        // Main thread reads: every byte was filled with the opaque
        // default background and every cell is clean.
        assert!(buf.chunks_exact(4).all(|px| px == [0x11, 0x11, 0x11, 0xff]));
        assert!(rows.iter().all(Row::all_clean));
    }
}
