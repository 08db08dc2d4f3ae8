//! Scroll damage, scrollback viewing and resize, observed at the pixel
//! level.

mod common;

use common::*;
use wayterm::render::Renderer;

fn fill_rows(term: &mut wayterm::Terminal) {
    for r in 0..term.rows() {
        let c = (b'a' + r as u8) as char;
        term.put_char(r, 0, c);
        term.put_char(r, 1, c);
    }
}

/// Scenario 6: a scroll record moves the painted band while a dirty row
/// repaints, in the same frame.
#[test]
fn scroll_and_repaint_coexist() {
    let mut term = term(10, 4, 6);
    term.cursor.hidden = true;
    fill_rows(&mut term);
    let mut canvas = Canvas::for_grid(10, 4);
    let font = test_font();
    let mut renderer = Renderer::new(3);

    renderer.render_frame(&mut term, &font, &mut canvas.buf, canvas.width, canvas.height);
    let old_rows: Vec<_> = (0..4).map(|r| canvas.row_region(r)).collect();

    term.scroll_up(0..4, 1);
    term.put_char(3, 0, 'Z');
    let outcome = renderer.render_frame(&mut term, &font, &mut canvas.buf, canvas.width, canvas.height);
    assert!(outcome.committed);

    // Rows 0..2 are the byte-moved previous rows 1..3.
    for r in 0..3 {
        assert_eq!(canvas.row_region(r), old_rows[r + 1], "moved row {}", r);
    }
    // Row 3 is freshly painted with the new glyph.
    assert_eq!(canvas.pixel(4, 3 * CH + 8), FG_PIXEL);
    assert!(view_all_clean(&term));

    // Damage covers both the scrolled band and the repainted row.
    assert!(
        outcome
            .damage
            .iter()
            .any(|r| r.y == 0 && r.height == 3 * CH as i32),
        "missing scroll band damage: {:?}",
        outcome.damage
    );
    assert!(
        outcome
            .damage
            .iter()
            .any(|r| r.y == 3 * CH as i32 && r.height == CH as i32),
        "missing repainted row damage: {:?}",
        outcome.damage
    );
}

/// Reverse scroll moves the band down and freshens the top.
#[test]
fn reverse_scroll_moves_band_down() {
    let mut term = term(10, 4, 6);
    term.cursor.hidden = true;
    fill_rows(&mut term);
    let mut canvas = Canvas::for_grid(10, 4);
    let font = test_font();
    let mut renderer = Renderer::new(0);

    renderer.render_frame(&mut term, &font, &mut canvas.buf, canvas.width, canvas.height);
    let old_rows: Vec<_> = (0..4).map(|r| canvas.row_region(r)).collect();

    term.scroll_down(0..4, 1);
    renderer.render_frame(&mut term, &font, &mut canvas.buf, canvas.width, canvas.height);

    for r in 1..4 {
        assert_eq!(canvas.row_region(r), old_rows[r - 1], "moved row {}", r);
    }
    // The freshened top row is background only.
    let empty = canvas.cell_region(5, 0);
    assert_eq!(canvas.cell_region(0, 0), empty);
}

/// Invariant 7: two single-line scrolls equal one two-line scroll.
#[test]
fn repeated_scroll_composes() {
    let font = test_font();

    let render_sequence = |lines: &[usize]| -> Vec<u8> {
        let mut term = term(10, 4, 6);
        term.cursor.hidden = true;
        fill_rows(&mut term);
        let mut canvas = Canvas::for_grid(10, 4);
        let mut renderer = Renderer::new(0);
        renderer.render_frame(&mut term, &font, &mut canvas.buf, canvas.width, canvas.height);
        for &n in lines {
            term.scroll_up(0..4, n);
        }
        renderer.render_frame(&mut term, &font, &mut canvas.buf, canvas.width, canvas.height);
        canvas.buf
    };

    assert_eq!(render_sequence(&[1, 1]), render_sequence(&[2]));
}

/// Scrolling the view into scrollback repaints the viewport with the
/// recalled rows.
#[test]
fn view_scrollback_recalls_rows() {
    let mut term = term(10, 4, 6);
    term.cursor.hidden = true;
    fill_rows(&mut term);
    let mut canvas = Canvas::for_grid(10, 4);
    let font = test_font();
    let mut renderer = Renderer::new(0);

    renderer.render_frame(&mut term, &font, &mut canvas.buf, canvas.width, canvas.height);

    term.scroll_up(0..4, 2);
    renderer.render_frame(&mut term, &font, &mut canvas.buf, canvas.width, canvas.height);
    // Live screen now ends with two empty rows.
    let empty = canvas.cell_region(5, 0);
    assert_eq!(canvas.cell_region(0, 3), empty);

    term.view_up(2);
    let outcome = renderer.render_frame(&mut term, &font, &mut canvas.buf, canvas.width, canvas.height);
    assert!(outcome.committed);
    // The viewport shows the four original rows again: bottom row holds
    // a glyph once more.
    assert_ne!(canvas.cell_region(0, 3), empty);
    assert_eq!(canvas.pixel(4, 8), FG_PIXEL);
    assert!(view_all_clean(&term));

    term.view_to_bottom();
    renderer.render_frame(&mut term, &font, &mut canvas.buf, canvas.width, canvas.height);
    assert_eq!(canvas.cell_region(0, 3), empty);
}

/// Growth keeps cell content addressable at the same coordinates, and
/// the regrown grid renders cleanly at the new size.
#[test]
fn resize_preserves_and_repaints() {
    let mut term = term(10, 4, 6);
    term.cursor.hidden = true;
    term.put_str(0, 0, "keep");
    term.put_str(3, 4, "me");
    let mut canvas = Canvas::for_grid(10, 4);
    let font = test_font();
    let mut renderer = Renderer::new(0);

    renderer.render_frame(&mut term, &font, &mut canvas.buf, canvas.width, canvas.height);

    assert!(term.resize((14 * CW) as u32, (6 * CH) as u32, 1, None));
    assert_eq!(term.cols(), 14);
    assert_eq!(term.rows(), 6);
    for (r, c, wc) in [(0, 0, 'k'), (0, 3, 'p'), (3, 4, 'm'), (3, 5, 'e')] {
        assert_eq!(term.grid().row_abs(r).unwrap().cells[c].wc, wc);
    }

    let mut big = Canvas::for_grid(14, 6);
    let outcome = renderer.render_frame(&mut term, &font, &mut big.buf, big.width, big.height);
    assert!(outcome.committed);
    assert!(view_all_clean(&term));
    // Preserved glyphs paint at their old positions; the grown area is
    // background.
    assert_eq!(big.pixel(4, 8), FG_PIXEL);
    assert_eq!(big.pixel(4 * CW + 4, 3 * CH + 8), FG_PIXEL);
    assert_eq!(big.pixel(12 * CW + 4, 5 * CH + 8), BG_PIXEL);
}
