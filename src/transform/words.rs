//! Static English dictionary preloaded into the text codec.
//!
//! Words are ordered roughly by corpus frequency so the most common ones get
//! the shortest index encodings. The table is parsed once per process; the
//! codec treats it as read-only and layers the per-block dynamic slots on
//! top of it.

/// Space-separated word list. Order defines the dictionary index.
pub const STATIC_WORDS: &str = "\
the of and to in a is that for it as was with be by on not he i this are or his from at which but \
have an had they you were their one all we can her has there been if more when will would who so no \
out up into them then she what time than could other only some these two may first new man like my \
now such make over our even most me state after also made many did must before back see through way \
where get much go well your know should down work year because come people just say each those take \
day good how long own too little use us very great still men here life both between old under last \
never place same another think house while high right might came off find states since used give \
against three himself look few general hand school part small american home during number again \
world fact said its water less public put thing almost power war day within being around however \
without every young national system really left second church face why few against per among often \
called always next big above nothing night end away case am law ever though point does whole far \
head something help god large until along got hands four group order open possible keep enough \
certain began different door went better nor early light children seemed white let yet course \
mean best example side development others given money social once told late real form saw need \
mind already though felt making want family turned itself mr move asked thought program line later \
having known city country upon become area problem name result times room word set toward able \
shall free party either run important interest am perhaps rather behind action question become \
play across although several love study business government story job matter kind service change \
least feet car sure whether period fall book close nature human history five act together today \
girl road moment mother moreover young themselves ago anything information experience boy week \
company short usually everything began person plan future music seems million federal bring \
anyone field woman air plant effect voice especially policy provide hold house control office \
strong past economic idea class become major care process america hours available education \
position trying sound report research table community believe level paper six red council common \
true value special members department local cost wife respect age needed front door further body \
learn reason write front lay american outside surface view rest clear certainly necessary simply \
evidence wanted else following street bill leave knowledge feel meeting market modern various \
section stand stood court society sense training property recent serve total cut building type \
energy cold quite whose spring therefore picture army basis stage couple attention union fire \
hour space land industry summer board black reached pressure answer miss particular amount ten \
earth situation methods ground north piece figure difference english committee defense purpose \
congress myself centre range single due president sort natural list individual alone higher \
difficult material week record private support decided president questions south science schools \
minutes force increase production century personal clearly move similar direction required \
political nation understand return involved food read low brought son living months seven value \
student medical third systems treatment peace bed designed gone addition tried image language \
equipment except lead football below account heart international theory held aid lower thinking \
average statement military instead hall trouble central written deal near square determined \
volume merely performance county security sales alone programs progress plans date entire \
issue approach wide normal size organization final pattern described influence stock numbers \
blood attack river cases specific carried length reaction rate dark growing received concerned \
published suddenly developed step numbers application meaning game complete truth month letter \
test physical choice island current stopped spirit distance audience manner opened justice \
corner works character beautiful practice evening moving generally former everyone labor main \
apparently fiscal bad spent maybe considered points lot station served appear window strength \
girls ready announced radio brown chance lines cause latter direct professional obtained hotel \
institutions anti beyond cars rise exactly permit terms changes stop divided separate weeks \
operation claim remember existence effective firm gives neither reported obviously quality \
mass cannot famous walked attitude brother charge science staff additional population remained \
immediately completely conditions wish daily poor facilities annual fear efforts fine seen \
expect slowly industrial variety race machine greater arms parents speak stress limited waiting \
christian inside product nations wrong persons fight murder taken teeth original indicate \
successful continue technical trees lips meant paid bridge drive please reasons covered nearly \
object demand report sunday administration santa increased literature faith supply limit sight \
remains unit regard county follow standing describe bottom argument final software source code \
data file files user users server client network web site page pages text byte bytes version \
function functions value values type types object objects array index string error errors null \
class method public static void return input output print start stop true false test build run \
load save open close read write update delete create remove insert select table row column key \
item items event events link list menu view model query result results status request response \
session thread process memory buffer stream filter format image video audio color width height \
size count total number group groups order field fields record records search sort copy paste \
edit undo redo next prev first last login logout admin password email address phone title \
default custom option options setting settings config module package library import export \
january february march april june july august september october november december monday \
tuesday wednesday thursday friday saturday morning afternoon tomorrow yesterday minute \
second degrees north south east west left center middle top bottom upper inner outer \
above below begin ending finish complete partial empty full half quarter double triple \
single multiple zero one hundred thousand billion dollar dollars percent price prices \
offer market markets trade trading bank banks money cash credit debit loan interest \
profit loss gain tax taxes income payment pay paid buy sell sold bought cheap expensive \
free cost costs budget fund funds invest investment share shares account accounts \
report reports news press media paper papers journal article articles author authors \
editor review reviews comment comments post posts blog forum thread topic subject \
message messages mail letter letters send sent receive received reply replies answer \
answers question questions ask asked tell told talk talked speak spoke said says \
";

/// Longest word the codec will index (length field is five bits).
pub const MAX_WORD_LEN: usize = 31;

/// Parse the static table into (offset, len) slices over [`STATIC_WORDS`].
/// Duplicate spellings keep their first (most frequent) position.
pub fn static_word_spans() -> Vec<(u32, u8)> {
    let bytes = STATIC_WORDS.as_bytes();
    let mut spans = Vec::with_capacity(1024);
    let mut seen = std::collections::HashSet::with_capacity(1024);
    let mut start = 0usize;
    let mut push = |spans: &mut Vec<(u32, u8)>, seen: &mut std::collections::HashSet<&'static [u8]>, s: usize, e: usize| {
        if e > s && e - s <= MAX_WORD_LEN {
            let w = &STATIC_WORDS.as_bytes()[s..e];
            if seen.insert(w) {
                spans.push((s as u32, (e - s) as u8));
            }
        }
    };
    for (i, &b) in bytes.iter().enumerate() {
        if b == b' ' || b == b'\n' {
            push(&mut spans, &mut seen, start, i);
            start = i + 1;
        }
    }
    push(&mut spans, &mut seen, start, bytes.len());
    spans
}
